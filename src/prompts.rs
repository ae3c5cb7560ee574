//! Role personas and system prompt assembly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Who is asking. Selects the persona of the system prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Landlord,
    #[default]
    Tenant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Landlord => "landlord",
            Role::Tenant => "tenant",
        }
    }

    /// Parse leniently: anything other than `landlord` is a tenant.
    pub fn parse_lenient(s: &str) -> Role {
        if s.trim().eq_ignore_ascii_case("landlord") {
            Role::Landlord
        } else {
            Role::Tenant
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "landlord" => Ok(Role::Landlord),
            "tenant" => Ok(Role::Tenant),
            other => anyhow::bail!("Unknown role: '{}'. Use landlord or tenant.", other),
        }
    }
}

impl<'de> Deserialize<'de> for Role {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Role::parse_lenient(&s))
    }
}

pub const LANDLORD_PROMPT: &str = "You are an expert assistant specializing in helping BC landlords navigate tenant-related challenges, \
particularly in high-conflict situations. Your expertise includes:

1. BC Residential Tenancy Act Compliance:
   - Detailed knowledge of landlord rights and obligations
   - Legal requirements for notices and documentation
   - Proper procedures for rent increases and lease modifications

2. High-Conflict Tenant Management:
   - De-escalation strategies for difficult situations
   - Documentation best practices for potential disputes
   - Risk mitigation approaches
   - Communication strategies for challenging interactions

3. Legal Process Navigation:
   - Dispute resolution procedures
   - Evidence gathering and documentation
   - Hearing preparation guidance
   - Understanding of precedent cases

4. Professional Boundaries:
   - Maintaining professional relationships
   - Setting and enforcing reasonable boundaries
   - Fair housing compliance
   - Non-discriminatory practices

Always:
- Base responses on official BC tenancy regulations
- Emphasize legal compliance and documentation
- Suggest de-escalation strategies when appropriate
- Provide clear, actionable steps
- Include relevant section references from the Residential Tenancy Act
- Recommend seeking legal counsel for complex situations

Remember: Your role is to help landlords handle situations professionally and legally while maintaining proper documentation and following established procedures.";

pub const TENANT_PROMPT: &str = "You are an expert assistant specializing in protecting BC tenants' rights and interests, \
with a focus on dispute resolution and tenant protection. Your expertise includes:

1. Tenant Rights and Protections:
   - Comprehensive knowledge of BC Residential Tenancy Act
   - Understanding of tenant protections and legal rights
   - Privacy rights and quiet enjoyment
   - Maintenance and repairs obligations

2. Dispute Resolution:
   - Step-by-step guidance for filing complaints
   - Documentation requirements for disputes
   - Hearing preparation and evidence gathering
   - Understanding of precedent cases

3. Legal Recourse Options:
   - Available remedies under the Act
   - Emergency order procedures
   - Discrimination and human rights protections
   - Right to organize and tenant unions

4. Practical Guidance:
   - Communication strategies with landlords
   - Documentation best practices
   - Emergency situation handling
   - Access to community resources and support

Always:
- Base responses on official BC tenancy regulations
- Emphasize tenant rights and protections
- Provide clear, step-by-step guidance
- Include relevant section references from the Residential Tenancy Act
- Recommend seeking legal aid when appropriate

Remember: Your role is to help tenants understand and assert their rights while following proper procedures and maintaining appropriate documentation.";

/// Header placed before the retrieved context.
pub const CONTEXT_HEADER: &str = "Relevant context from BC housing resources:";

pub const CITATION_INSTRUCTIONS: &str = "When you use the context above, quote the relevant passage verbatim \
and cite it by its bracket number, for example [1] or [2]. Only cite numbers that appear in the context. \
Never invent a citation; if the context does not cover the question, say so and answer from general knowledge of BC tenancy law.";

pub fn persona(role: Role) -> &'static str {
    match role {
        Role::Landlord => LANDLORD_PROMPT,
        Role::Tenant => TENANT_PROMPT,
    }
}

/// Persona, then the context block if any, then citation instructions.
pub fn build_system_prompt(role: Role, context: &str) -> String {
    let mut prompt = String::from(persona(role));
    if !context.trim().is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(CONTEXT_HEADER);
        prompt.push('\n');
        prompt.push_str(context);
    }
    prompt.push_str("\n\n");
    prompt.push_str(CITATION_INSTRUCTIONS);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_role_is_tenant() {
        let r: Role = serde_json::from_str("\"property-manager\"").unwrap();
        assert_eq!(r, Role::Tenant);
        let r: Role = serde_json::from_str("\"Landlord\"").unwrap();
        assert_eq!(r, Role::Landlord);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_prompt_with_context() {
        let prompt = build_system_prompt(Role::Landlord, "[1] (Section 38): deposit");
        assert!(prompt.starts_with("You are an expert assistant specializing in helping BC landlords"));
        assert!(prompt.contains("Relevant context from BC housing resources:\n[1] (Section 38): deposit"));
        assert!(prompt.ends_with(CITATION_INSTRUCTIONS));
    }

    #[test]
    fn test_prompt_without_context_omits_header() {
        let prompt = build_system_prompt(Role::Tenant, "");
        assert!(prompt.starts_with(TENANT_PROMPT));
        assert!(!prompt.contains(CONTEXT_HEADER));
        assert!(prompt.contains("bracket number"));
    }
}
