use anyhow::{bail, Context, Result};
use std::io::ErrorKind;
use std::process::Command;

/// Azure DevOps resource id used when asking Azure AD for a token.
pub const ADO_RESOURCE_ID: &str = "499b84ac-1321-427f-aa17-267ca6975798";

/// How requests to Azure DevOps are authenticated.
#[derive(Clone)]
pub enum Credentials {
    /// Personal access token, sent as HTTP Basic with an empty user name.
    Pat(String),
    /// Azure AD access token, sent as a bearer token.
    Bearer(String),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pat(_) => write!(f, "Pat(<redacted>)"),
            Self::Bearer(_) => write!(f, "Bearer(<redacted>)"),
        }
    }
}

impl Credentials {
    /// Use the PAT when one is configured, otherwise ask the Azure CLI.
    pub fn resolve(pat: Option<&str>) -> Result<Self> {
        match pat.map(str::trim).filter(|p| !p.is_empty()) {
            Some(pat) => Ok(Self::Pat(pat.to_string())),
            None => Ok(Self::Bearer(AzureCli::new().access_token()?)),
        }
    }

    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Self::Pat(pat) => request.basic_auth("", Some(pat)),
            Self::Bearer(token) => request.bearer_auth(token),
        }
    }
}

/// Bridge to the `az` CLI binary for interactive-login tokens.
pub struct AzureCli {
    bin: String,
}

impl AzureCli {
    pub fn new() -> Self {
        Self {
            bin: "az".to_string(),
        }
    }

    /// Use a different executable (tests, non-standard installs).
    pub fn with_bin(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Fetch an Azure DevOps access token for the signed-in account.
    pub fn access_token(&self) -> Result<String> {
        let output = match Command::new(&self.bin)
            .args([
                "account",
                "get-access-token",
                "--resource",
                ADO_RESOURCE_ID,
                "--query",
                "accessToken",
                "-o",
                "tsv",
            ])
            .output()
        {
            Err(e) if e.kind() == ErrorKind::NotFound => bail!(
                "Azure CLI not found. Install it from https://aka.ms/installazurecli \
                 or set ADO_PAT."
            ),
            other => other.with_context(|| {
                format!("Failed to run `{} account get-access-token`", self.bin)
            })?,
        };

        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() || token.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "Azure CLI token fetch failed. Run `az login` first. Error: {}",
                stderr.trim()
            );
        }

        Ok(token)
    }
}

impl Default for AzureCli {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pat_is_preferred() {
        let creds = Credentials::resolve(Some(" secret ")).unwrap();
        assert!(matches!(creds, Credentials::Pat(ref p) if p == "secret"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let creds = Credentials::Pat("secret".into());
        assert!(!format!("{creds:?}").contains("secret"));
    }

    #[test]
    fn missing_cli_has_install_hint() {
        let err = AzureCli::with_bin("definitely-not-az-cli-binary")
            .access_token()
            .unwrap_err();
        assert!(err.to_string().contains("Azure CLI not found"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_cli_asks_for_login() {
        // `false` exits 1 with no output, like `az` without a session.
        let err = AzureCli::with_bin("false").access_token().unwrap_err();
        assert!(err.to_string().contains("az login"));
    }
}
