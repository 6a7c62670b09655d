use std::path::{Path, PathBuf};

use anyhow::Context as _;
use paceload_core::{Profile, ProfileSource, TestDefinition};
use serde::Deserialize;

use crate::run_error::RunError;

pub(crate) async fn load_definition(path: &Path) -> anyhow::Result<TestDefinition> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read test definition: {}", path.display()))?;
    parse_definition(&text)
        .with_context(|| format!("invalid test definition: {}", path.display()))
}

/// YAML or JSON (JSON documents are valid YAML).
fn parse_definition(text: &str) -> anyhow::Result<TestDefinition> {
    Ok(serde_yaml::from_str(text)?)
}

/// Either a bare list of profiles or a document with a top-level `profiles` list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ProfilesDocument {
    List(Vec<Profile>),
    Wrapped { profiles: Vec<Profile> },
}

/// Profiles stored in a YAML file.
#[derive(Debug, Clone)]
pub(crate) struct ProfilesFile {
    path: PathBuf,
}

impl ProfilesFile {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProfileSource for ProfilesFile {
    fn load_all(&self) -> paceload_core::Result<Vec<Profile>> {
        let text = std::fs::read_to_string(&self.path).map_err(|err| {
            paceload_core::Error::Profiles(format!("{}: {err}", self.path.display()))
        })?;
        parse_profiles(&text).map_err(|err| {
            paceload_core::Error::Profiles(format!("{}: {err}", self.path.display()))
        })
    }
}

fn parse_profiles(text: &str) -> Result<Vec<Profile>, serde_yaml::Error> {
    Ok(match serde_yaml::from_str(text)? {
        ProfilesDocument::List(profiles) | ProfilesDocument::Wrapped { profiles } => profiles,
    })
}

pub(crate) fn classify_core_error(context: &'static str, err: paceload_core::Error) -> RunError {
    use paceload_core::Error as CoreError;

    let kind = match &err {
        CoreError::InvalidUsers
        | CoreError::NoProfiles
        | CoreError::NoOperations
        | CoreError::UnknownOperation { .. }
        | CoreError::DuplicateOperation(_)
        | CoreError::ProfileNotFound { .. } => RunError::InvalidInput,

        CoreError::Profiles(_) => RunError::SetupError,

        CoreError::Io(_) => RunError::RuntimeError,
    };

    kind(anyhow::Error::new(err).context(context))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yaml_and_json_definitions() {
        let yaml = "\
name: nightly
duration: 2m
commandDelay: 500ms
scriptDelay: 5s
concurrentUsers: 3
zosmfProfiles: [lpar1, lpar2]
operations: [TsoCommand]
memberSize: 10KB
jobCard:
  - \"//$jobname JOB (ACCT)\"
";
        let def = parse_definition(yaml).unwrap_or_else(|e| panic!("yaml: {e:#}"));
        assert_eq!(def.name, "nightly");
        assert_eq!(def.concurrent_users, 3);
        assert_eq!(def.profiles, vec!["lpar1", "lpar2"]);
        assert_eq!(def.operations, vec!["TsoCommand"]);
        assert_eq!(def.member_size.as_deref(), Some("10KB"));
        assert_eq!(def.job_card.len(), 1);

        let json = r#"{"name":"j","duration":"1s","concurrentUsers":1,"profiles":["p"]}"#;
        let def = parse_definition(json).unwrap_or_else(|e| panic!("json: {e:#}"));
        assert_eq!(def.duration.as_deref(), Some("1s"));
        assert_eq!(def.profiles, vec!["p"]);
    }

    #[test]
    fn rejects_malformed_definitions() {
        assert!(parse_definition("concurrentUsers: [1, 2]").is_err());
        assert!(parse_definition("{").is_err());
    }

    #[test]
    fn parses_both_profile_layouts() {
        let list = "\
- name: lpar1
  type: rest
  credentials:
    baseUrl: http://127.0.0.1:9000
    user: ibmuser
";
        let profiles = parse_profiles(list).unwrap_or_else(|e| panic!("list: {e}"));
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].credential("user"), Some("ibmuser"));

        let wrapped = "profiles:\n  - name: a\n    kind: rest\n  - name: b\n    type: ssh\n";
        let profiles = parse_profiles(wrapped).unwrap_or_else(|e| panic!("wrapped: {e}"));
        assert_eq!(
            profiles.iter().map(|p| p.kind.as_str()).collect::<Vec<_>>(),
            vec!["rest", "ssh"]
        );
    }

    #[test]
    fn missing_profiles_file_is_a_setup_error() {
        let err = ProfilesFile::new("/nonexistent/profiles.yaml")
            .load_all()
            .err()
            .unwrap_or_else(|| panic!("expected an error"));
        let classified = classify_core_error("failed to load profiles", err);
        assert!(matches!(classified, RunError::SetupError(_)));
    }

    #[test]
    fn unknown_operation_is_invalid_input() {
        let err = paceload_core::Error::UnknownOperation {
            name: "Nope".to_string(),
            known: "A, B".to_string(),
        };
        let classified = classify_core_error("invalid operation selection", err);
        assert!(matches!(classified, RunError::InvalidInput(_)));
        assert!(classified.to_string().contains("unknown operation `Nope`"));
    }
}
