use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::Serialize;
use tracing::{debug, info};
use crate::error::{Error, Result};
use crate::job::{memory_requirement, JobTemplate, ResourceRequest};
use crate::settings::GeneratorSettings;
use crate::test_case::TestCase;

pub const RUN_NOISE_FILE:&str = "run_noise.yml";
pub const RUN_MAIN_FILE:&str = "run_main.yml";
pub const CASE_FILE:&str = "case.yml";
pub const NOISE_DATA_FILE:&str = "noise.h5";
pub const MAIN_DATA_FILE:&str = "main.h5";

/// path relative to the data root -> md5 hex digest
pub type FileDependencies = BTreeMap<String,String>;

#[derive(Clone,Debug,Serialize,PartialEq)]
pub struct RunEntry {
    pub run_file_path:String,
    pub dat_file_path:String,
}

#[derive(Clone,Debug,Serialize,PartialEq)]
pub struct ReferenceImage {
    pub reference_file_path:String,
    pub scale_comparison_threshold:f64,
    pub value_comparison_threshold:f64,
}

#[derive(Clone,Debug,Default,Serialize,PartialEq)]
pub struct Validation {
    pub images:BTreeMap<String,ReferenceImage>,
}

/// Contents of `case.yml`, under a top-level `case` key
#[derive(Clone,Debug,Serialize,PartialEq)]
pub struct CaseDescription {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise:Option<RunEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main:Option<RunEntry>,
    pub validation:Validation,
    pub name:String,
}

#[derive(Serialize)]
struct CaseDocument<'a> {
    case:&'a CaseDescription,
}

/// Writes the run files and case summary for test cases under the data root
pub struct DescriptionGenerator {
    settings:GeneratorSettings,
}

impl DescriptionGenerator {

    pub fn new(settings:GeneratorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Write `run_noise.yml` and `run_main.yml` (when the case has those stages) and
    /// `case.yml` into `case_dir`. Every written file is returned with its digest.
    pub fn generate(&self,case:&TestCase,case_dir:&Path) -> Result<FileDependencies> {
        std::fs::create_dir_all(case_dir).map_err(|e| utils::Error::io(case_dir,e))?;
        let mut deps = FileDependencies::new();

        let noise = match &case.dependency_client {
            Some(dep) => {
                let mut job = JobTemplate::load(&self.settings.noise_template)?;
                job.substitute_placeholder(&self.settings.noise_placeholder,&dep.configuration)?;
                let run_file = case_dir.join(RUN_NOISE_FILE);
                self.write(&run_file,job.to_yaml()?.as_bytes(),&mut deps)?;
                Some(RunEntry {
                    run_file_path:path_string(&run_file),
                    dat_file_path:path_string(&case_dir.join(NOISE_DATA_FILE)),
                })
            }
            None => None,
        };

        let main = match &case.reconstruction_client {
            Some(recon) => {
                let mut job = JobTemplate::load(&self.settings.main_template)?;
                job.substitute_placeholder(&self.settings.main_placeholder,&recon.configuration)?;
                let memory = memory_requirement(&case.name,case.requirements.system_memory,&self.settings);
                job.apply_resources(&ResourceRequest {
                    memory:memory.clone(),
                    gpu:case.requirements.gpu_support,
                })?;
                if let Some(distributed) = &case.distributed {
                    job.add_workers(&self.settings.worker,distributed.nodes,&memory)?;
                }
                let run_file = case_dir.join(RUN_MAIN_FILE);
                self.write(&run_file,job.to_yaml()?.as_bytes(),&mut deps)?;
                Some(RunEntry {
                    run_file_path:path_string(&run_file),
                    dat_file_path:path_string(&case_dir.join(MAIN_DATA_FILE)),
                })
            }
            None => None,
        };

        let mut validation = Validation::default();
        for test in &case.reconstruction_tests {
            validation.images.insert(test.reference_images.clone(),ReferenceImage {
                reference_file_path:path_string(&case_dir.join(&test.reference_file)),
                scale_comparison_threshold:test.scale_comparison_threshold,
                value_comparison_threshold:test.value_comparison_threshold,
            });
        }

        let description = CaseDescription { noise, main, validation, name:case.name.clone() };
        let case_file = case_dir.join(CASE_FILE);
        let yaml = serde_yaml::to_string(&CaseDocument { case:&description })
            .map_err(|source| Error::Yaml { path:case_file.clone(), source })?;
        self.write(&case_file,yaml.as_bytes(),&mut deps)?;

        info!("generated {} files for {}",deps.len(),case.name);
        Ok(deps)
    }

    /// key a file by its path relative to the data root
    pub fn dependency_key(&self,file:&Path) -> Result<String> {
        let root = utils::normalize(&self.settings.data_root);
        let rel = utils::relative_path(&utils::normalize(file),&root)?;
        Ok(path_string(&rel))
    }

    pub fn case_dir(&self,case:&TestCase) -> PathBuf {
        self.settings.data_root.join(case.stem())
    }

    fn write(&self,file:&Path,bytes:&[u8],deps:&mut FileDependencies) -> Result<()> {
        let digest = utils::write_with_digest(file,bytes)?;
        debug!("{} md5 {}",file.display(),digest);
        deps.insert(self.dependency_key(file)?,digest);
        Ok(())
    }
}

fn path_string(p:&Path) -> String {
    p.to_string_lossy().into_owned()
}
