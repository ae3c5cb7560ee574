//! Always-on legislation excerpts.
//!
//! A fixed source of hand-authored summaries of key sections of the BC
//! *Residential Tenancy Act*. Each section is one chunk; nothing here is
//! derived by chunking free text.

use crate::chunk::hash_text;
use crate::models::{Chunk, KnowledgeSource, SourceDetails};

/// Stable id of the built-in legislation source.
pub const BUILTIN_LEGISLATION_ID: &str = "bc-rta";

const BUILTIN_LEGISLATION_NAME: &str = "Residential Tenancy Act (British Columbia)";

/// `(section, excerpt)` pairs in statute order.
const SECTIONS: &[(&str, &str)] = &[
    (
        "5",
        "Landlords and tenants may not avoid or contract out of the Act or the regulations. \
         Any attempt to do so has no effect.",
    ),
    (
        "19",
        "A landlord must not require or accept a security deposit or a pet damage deposit that \
         is greater than the equivalent of one half of one month's rent payable under the \
         tenancy agreement.",
    ),
    (
        "23",
        "The landlord and tenant together must inspect the condition of the rental unit on the \
         day the tenant is entitled to possession, and the landlord must complete a condition \
         inspection report and give the tenant a copy.",
    ),
    (
        "26",
        "A tenant must pay rent when it is due under the tenancy agreement, whether or not the \
         landlord complies with the Act, unless the tenant has a right under the Act to deduct \
         all or a portion of the rent.",
    ),
    (
        "28",
        "A tenant is entitled to quiet enjoyment, including reasonable privacy, freedom from \
         unreasonable disturbance, exclusive possession subject to the landlord's right of \
         entry, and use of common areas for reasonable and lawful purposes.",
    ),
    (
        "29",
        "A landlord must not enter a rental unit unless the tenant consents at the time of entry \
         or the landlord gives written notice at least 24 hours and not more than 30 days before \
         the entry, stating the purpose and a reasonable time between 8 a.m. and 9 p.m.",
    ),
    (
        "32",
        "A landlord must provide and maintain residential property in a state of decoration and \
         repair that complies with health, safety and housing standards required by law. A \
         tenant must repair damage caused by the tenant's actions or neglect.",
    ),
    (
        "38",
        "Within 15 days after the later of the date the tenancy ends and the date the landlord \
         receives the tenant's forwarding address in writing, the landlord must repay any \
         security deposit or pet damage deposit with interest, or apply for dispute resolution \
         claiming against it. A landlord who fails to do so must pay the tenant double the \
         amount of the deposit.",
    ),
    (
        "42",
        "A landlord must not impose a rent increase for at least 12 months after the date the \
         existing rent was established. A landlord must give a tenant notice of a rent increase \
         at least 3 months before the effective date, in the approved form.",
    ),
    (
        "43",
        "A landlord may impose a rent increase only up to the amount calculated under the \
         regulations, ordered by the director on an application for an additional rent \
         increase, including for eligible capital expenditure, or agreed to by the tenant in \
         writing.",
    ),
    (
        "46",
        "A landlord may end a tenancy if rent is unpaid on any day after the day it is due by \
         giving notice to end the tenancy effective on a date not earlier than 10 days after \
         the date the tenant receives the notice.",
    ),
    (
        "47",
        "A landlord may end a tenancy for cause, for example repeated late payment of rent, \
         unreasonable disturbance of other occupants, or significant damage to the property, \
         by giving notice effective not earlier than one month after it is received.",
    ),
    (
        "49",
        "A landlord may end a tenancy if the landlord or a close family member intends in good \
         faith to occupy the rental unit, by giving notice effective not earlier than 4 months \
         after the date the tenant receives it.",
    ),
    (
        "51",
        "A tenant who receives a notice to end a tenancy for landlord's use of property is \
         entitled to receive from the landlord an amount equal to one month's rent payable \
         under the tenancy agreement.",
    ),
];

/// The built-in legislation source, one chunk per section.
pub fn builtin_legislation() -> KnowledgeSource {
    let chunks: Vec<Chunk> = SECTIONS
        .iter()
        .enumerate()
        .map(|(i, (section, text))| Chunk {
            position: i as i64,
            text: text.to_string(),
            section: Some(section.to_string()),
            hash: hash_text(text),
        })
        .collect();

    KnowledgeSource {
        id: BUILTIN_LEGISLATION_ID.to_string(),
        name: BUILTIN_LEGISLATION_NAME.to_string(),
        active: true,
        content: Some(
            chunks
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        ),
        chunks,
        details: SourceDetails::Legislation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceKind;

    #[test]
    fn test_every_section_has_an_id() {
        let source = builtin_legislation();
        assert_eq!(source.kind(), SourceKind::Legislation);
        assert!(!source.chunks.is_empty());
        for (i, chunk) in source.chunks.iter().enumerate() {
            assert_eq!(chunk.position, i as i64);
            assert!(chunk.section.is_some());
        }
    }
}
