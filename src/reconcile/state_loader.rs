//! Reads Terraform/OpenTofu state documents into the managed set.

use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::type_map::identifier_rule;
use crate::error::StateParseError;
use crate::traits::{CommandExecutor, FileSystem};

/// How deep directory sources are searched for `*.tfstate` files
const MAX_STATE_DEPTH: usize = 8;

/// One managed resource instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedResource {
    pub iac_type: String,
    pub address: String,
    pub canonical_id: String,
}

/// Where to read state from
#[derive(Debug, Clone, PartialEq)]
pub enum StateSource {
    /// A single state file
    File(PathBuf),
    /// Every `*.tfstate` file below a directory
    Dir(PathBuf),
    /// `<iac_binary> state pull` in a working directory
    Pull(PathBuf),
}

#[derive(Debug, Deserialize)]
struct StateDocument {
    #[serde(default)]
    resources: Vec<StateResource>,
}

#[derive(Debug, Deserialize)]
struct StateResource {
    #[serde(default)]
    module: Option<String>,
    mode: String,
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    instances: Vec<StateInstance>,
}

#[derive(Debug, Deserialize)]
struct StateInstance {
    #[serde(default)]
    index_key: Option<Value>,
    #[serde(default)]
    attributes: serde_json::Map<String, Value>,
}

/// Build the address of one instance, e.g. `module.net.aws_subnet.private["a"]`
fn instance_address(resource: &StateResource, instance: &StateInstance) -> String {
    let mut address = match &resource.module {
        Some(module) if !module.is_empty() => {
            format!("{}.{}.{}", module, resource.resource_type, resource.name)
        }
        _ => format!("{}.{}", resource.resource_type, resource.name),
    };

    match &instance.index_key {
        Some(Value::Number(n)) => address.push_str(&format!("[{}]", n)),
        Some(Value::String(s)) => address.push_str(&format!("[{:?}]", s)),
        _ => {}
    }

    address
}

/// Parse one state document into managed resources.
///
/// Data sources are skipped; instances whose identifier cannot be extracted
/// are dropped.
pub fn parse_state(content: &str, origin: &Path) -> Result<Vec<ManagedResource>, StateParseError> {
    let document: StateDocument =
        serde_json::from_str(content).map_err(|e| StateParseError::Malformed {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut managed = Vec::new();

    for resource in document.resources.iter().filter(|r| r.mode == "managed") {
        let rule = identifier_rule(&resource.resource_type);

        for instance in &resource.instances {
            let address = instance_address(resource, instance);

            match rule.extract_json(&instance.attributes) {
                Some(id) => managed.push(ManagedResource {
                    iac_type: resource.resource_type.clone(),
                    address,
                    canonical_id: id.to_string(),
                }),
                None => debug!("{}: no identifier attribute, skipping", address),
            }
        }
    }

    Ok(managed)
}

/// Loads managed resources from files, directories, or `state pull`
pub struct StateLoader {
    fs: Arc<dyn FileSystem>,
    command: Arc<dyn CommandExecutor>,
    iac_binary: String,
}

impl StateLoader {
    pub fn new(fs: Arc<dyn FileSystem>, command: Arc<dyn CommandExecutor>, iac_binary: &str) -> Self {
        Self {
            fs,
            command,
            iac_binary: iac_binary.to_string(),
        }
    }

    /// Load every source and concatenate the results
    pub fn load(&self, sources: &[StateSource]) -> Result<Vec<ManagedResource>, StateParseError> {
        let mut managed = Vec::new();

        for source in sources {
            let loaded = match source {
                StateSource::File(path) => self.load_file(path)?,
                StateSource::Dir(dir) => self.load_dir(dir)?,
                StateSource::Pull(dir) => self.pull(dir)?,
            };
            managed.extend(loaded);
        }

        info!("Loaded {} managed resource(s) from {} source(s)", managed.len(), sources.len());
        Ok(managed)
    }

    fn load_file(&self, path: &Path) -> Result<Vec<ManagedResource>, StateParseError> {
        if !self.fs.exists(path) {
            return Err(StateParseError::Missing(path.to_path_buf()));
        }

        let content = self
            .fs
            .read_to_string(path)
            .map_err(|e| StateParseError::Unreadable {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let managed = parse_state(&content, path)?;
        debug!("{}: {} managed resource(s)", path.display(), managed.len());
        Ok(managed)
    }

    fn load_dir(&self, dir: &Path) -> Result<Vec<ManagedResource>, StateParseError> {
        if !self.fs.is_dir(dir) {
            return Err(StateParseError::Missing(dir.to_path_buf()));
        }

        let files: Vec<PathBuf> = self
            .fs
            .walk_files(dir, MAX_STATE_DEPTH)
            .map_err(|e| StateParseError::Unreadable {
                path: dir.to_path_buf(),
                message: e.to_string(),
            })?
            .into_iter()
            .filter(|p| p.extension().is_some_and(|ext| ext == "tfstate"))
            .collect();

        if files.is_empty() {
            return Err(StateParseError::Missing(dir.to_path_buf()));
        }

        let mut managed = Vec::new();
        for file in files {
            managed.extend(self.load_file(&file)?);
        }
        Ok(managed)
    }

    fn pull(&self, dir: &Path) -> Result<Vec<ManagedResource>, StateParseError> {
        let args = vec!["state".to_string(), "pull".to_string()];
        let output = self
            .command
            .execute(&self.iac_binary, &args, &[], Some(dir))
            .map_err(|e| StateParseError::PullFailed {
                dir: dir.to_path_buf(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(StateParseError::PullFailed {
                dir: dir.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let content = String::from_utf8_lossy(&output.stdout);

        // A workspace without state prints nothing
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        parse_state(&content, dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{MockCommandExecutor, MockCommandResult, MockFileSystem};

    const STATE: &str = r#"{
        "version": 4,
        "terraform_version": "1.7.5",
        "resources": [
            {
                "mode": "managed",
                "type": "aws_s3_bucket",
                "name": "logs",
                "provider": "provider[\"registry.terraform.io/hashicorp/aws\"]",
                "instances": [{"attributes": {"bucket": "alpha", "arn": "arn:aws:s3:::alpha"}}]
            },
            {
                "mode": "data",
                "type": "aws_s3_bucket",
                "name": "existing",
                "instances": [{"attributes": {"bucket": "shared"}}]
            },
            {
                "module": "module.net",
                "mode": "managed",
                "type": "aws_vpc",
                "name": "main",
                "instances": [{"attributes": {"id": "vpc-1"}}]
            },
            {
                "mode": "managed",
                "type": "aws_instance",
                "name": "web",
                "instances": [
                    {"index_key": 0, "attributes": {"id": "i-0"}},
                    {"index_key": 1, "attributes": {"id": "i-1"}}
                ]
            },
            {
                "mode": "managed",
                "type": "aws_iam_role",
                "name": "r",
                "instances": [{"index_key": "app", "attributes": {"name": "app-role"}}]
            },
            {
                "mode": "managed",
                "type": "aws_route53_record",
                "name": "www",
                "instances": [{"attributes": {"id": "Z1_www_A"}}]
            },
            {
                "mode": "managed",
                "type": "random_pet",
                "name": "suffix",
                "instances": [{"attributes": {"length": 2}}]
            }
        ]
    }"#;

    #[test]
    fn test_parse_managed_only_with_addresses() {
        let managed = parse_state(STATE, Path::new("test.tfstate")).unwrap();
        let addresses: Vec<_> = managed.iter().map(|m| m.address.as_str()).collect();

        assert_eq!(
            addresses,
            vec![
                "aws_s3_bucket.logs",
                "module.net.aws_vpc.main",
                "aws_instance.web[0]",
                "aws_instance.web[1]",
                "aws_iam_role.r[\"app\"]",
                "aws_route53_record.www",
            ]
        );
        assert_eq!(managed[0].canonical_id, "alpha");
        assert_eq!(managed[4].canonical_id, "app-role");
        assert_eq!(managed[5].canonical_id, "Z1_www_A");
    }

    #[test]
    fn test_malformed_state() {
        let err = parse_state("{\"resources\": 5}", Path::new("bad.tfstate")).unwrap_err();
        assert!(matches!(err, StateParseError::Malformed { .. }));
    }

    #[test]
    fn test_missing_file() {
        let loader = StateLoader::new(
            Arc::new(MockFileSystem::new()),
            Arc::new(MockCommandExecutor::new()),
            "terraform",
        );
        let err = loader
            .load(&[StateSource::File(PathBuf::from("/nope.tfstate"))])
            .unwrap_err();
        assert!(matches!(err, StateParseError::Missing(_)));
    }

    #[test]
    fn test_dir_source_walks_tfstate_files() {
        let fs = Arc::new(MockFileSystem::new());
        fs.write(Path::new("/states/a/terraform.tfstate"), STATE).unwrap();
        fs.write(
            Path::new("/states/b/terraform.tfstate"),
            r#"{"resources": [{"mode": "managed", "type": "aws_vpc", "name": "x",
                "instances": [{"attributes": {"id": "vpc-9"}}]}]}"#,
        )
        .unwrap();
        fs.write(Path::new("/states/a/terraform.tfstate.backup"), "garbage").unwrap();
        fs.write(Path::new("/states/README.md"), "docs").unwrap();

        let loader = StateLoader::new(fs, Arc::new(MockCommandExecutor::new()), "terraform");
        let managed = loader
            .load(&[StateSource::Dir(PathBuf::from("/states"))])
            .unwrap();

        assert_eq!(managed.len(), 7);
        assert_eq!(managed[6].canonical_id, "vpc-9");
    }

    #[test]
    fn test_dir_without_state_is_missing() {
        let fs = Arc::new(MockFileSystem::new());
        fs.create_dir_all(Path::new("/empty")).unwrap();

        let loader = StateLoader::new(fs, Arc::new(MockCommandExecutor::new()), "terraform");
        let err = loader
            .load(&[StateSource::Dir(PathBuf::from("/empty"))])
            .unwrap_err();
        assert!(matches!(err, StateParseError::Missing(_)));
    }

    #[test]
    fn test_state_pull() {
        let command = Arc::new(MockCommandExecutor::with_outputs(vec![MockCommandResult::ok(
            "tofu state pull",
            STATE,
        )]));
        let loader = StateLoader::new(Arc::new(MockFileSystem::new()), command.clone(), "tofu");

        let managed = loader
            .load(&[StateSource::Pull(PathBuf::from("/work/infra"))])
            .unwrap();
        assert_eq!(managed.len(), 6);
        assert_eq!(command.invocations().len(), 1);
    }

    #[test]
    fn test_state_pull_failure() {
        let command = Arc::new(MockCommandExecutor::with_outputs(vec![MockCommandResult::fail(
            "state pull",
            "Error: No such file or directory",
        )]));
        let loader = StateLoader::new(Arc::new(MockFileSystem::new()), command, "terraform");

        let err = loader
            .load(&[StateSource::Pull(PathBuf::from("/work"))])
            .unwrap_err();
        assert!(matches!(err, StateParseError::PullFailed { .. }));
    }
}
