//! Cloud provider identifiers.
//!
//! Each provider has a different notion of account scope (region,
//! subscription, project) and a different CLI used to reach its APIs. The
//! rest of the system treats providers uniformly through this enum.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Supported cloud providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    /// Amazon Web Services (scopes are regions).
    Aws,
    /// Microsoft Azure (scopes are subscription IDs).
    Azure,
    /// Google Cloud Platform (scopes are project IDs).
    Gcp,
}

impl CloudProvider {
    /// All providers, in the order they are scanned by default.
    pub const ALL: [CloudProvider; 3] =
        [CloudProvider::Aws, CloudProvider::Azure, CloudProvider::Gcp];

    /// Lowercase wire name used in reports and CLI arguments.
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws",
            CloudProvider::Azure => "azure",
            CloudProvider::Gcp => "gcp",
        }
    }

    /// Uppercase name used in summary rows.
    pub fn upper(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "AWS",
            CloudProvider::Azure => "AZURE",
            CloudProvider::Gcp => "GCP",
        }
    }

    /// The provider CLI the collectors shell out to.
    pub fn cli_program(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws",
            CloudProvider::Azure => "az",
            CloudProvider::Gcp => "gcloud",
        }
    }

    /// What this provider calls an account scope.
    pub fn scope_noun(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "region",
            CloudProvider::Azure => "subscription",
            CloudProvider::Gcp => "project",
        }
    }

    /// Scope to fall back to when discovery fails and no override was given.
    ///
    /// Azure and GCP have no safe default; discovery failure there is a
    /// provider-level error instead.
    pub fn default_scope(&self) -> Option<&'static str> {
        match self {
            CloudProvider::Aws => Some("us-east-1"),
            CloudProvider::Azure | CloudProvider::Gcp => None,
        }
    }

    /// Actionable guidance shown when credentials are missing or expired.
    pub fn credential_guidance(&self) -> &'static str {
        match self {
            CloudProvider::Aws => {
                "Configure AWS credentials: run 'aws configure', set \
                 AWS_ACCESS_KEY_ID/AWS_SECRET_ACCESS_KEY, or use an IAM role."
            }
            CloudProvider::Azure => {
                "Sign in to Azure: run 'az login', or provide a service \
                 principal via AZURE_CLIENT_ID/AZURE_CLIENT_SECRET/AZURE_TENANT_ID."
            }
            CloudProvider::Gcp => {
                "Authenticate with GCP: run 'gcloud auth login' or set \
                 GOOGLE_APPLICATION_CREDENTIALS to a service account key."
            }
        }
    }
}

impl std::fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CloudProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "aws" => Ok(CloudProvider::Aws),
            "azure" => Ok(CloudProvider::Azure),
            "gcp" | "google" => Ok(CloudProvider::Gcp),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for provider in CloudProvider::ALL {
            assert_eq!(provider.as_str().parse::<CloudProvider>(), Ok(provider));
        }
    }

    #[test]
    fn upper_matches_wire_name() {
        for provider in CloudProvider::ALL {
            assert_eq!(provider.upper(), provider.as_str().to_uppercase());
        }
    }

    #[test]
    fn only_aws_has_a_default_scope() {
        assert_eq!(CloudProvider::Aws.default_scope(), Some("us-east-1"));
        assert_eq!(CloudProvider::Azure.default_scope(), None);
        assert_eq!(CloudProvider::Gcp.default_scope(), None);
    }
}
