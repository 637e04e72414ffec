use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::{Error, Result};

/// cases whose reconstruction needs more memory than their case file asks for
pub const HIGH_MEMORY_CASES:[&str;5] = [
    "generic_grappa2x1_3d.cfg",
    "generic_grappa2x2_3d.cfg",
    "epi_2d.cfg",
    "generic_spirit_cartesian_sampling_spat2.cfg",
    "generic_rtcine_ai_landmark.cfg",
];
pub const HIGH_MEMORY_SURCHARGE_GB:u64 = 4;

pub const NOISE_PLACEHOLDER:&str = "default_measurement_dependencies.xml";
pub const MAIN_PLACEHOLDER:&str = "default.xml";

pub trait ConfigFile: Sized {
    fn to_file(&self,filename:&Path) -> Result<()>;
    fn from_file(filename:&Path) -> Result<Self>;
    fn file_ext() -> String;
}

/// The remote worker group added to distributed jobs
#[derive(Clone,Debug,Serialize,Deserialize,PartialEq)]
pub struct WorkerSettings {
    pub image:String,
    pub nodepool:String,
    pub command:Vec<String>,
    pub args:Vec<String>,
    pub cpu:String,
    pub endpoint_name:String,
    pub endpoint_port:u16,
    /// command the job runs to discover its workers
    pub endpoint_env_command:String,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            image:String::from("eminencepublic.azurecr.io/gadgetron:current"),
            nodepool:String::from("cpunp"),
            command:vec![
                String::from("/tini"),
                String::from("--"),
                String::from("/opt/entrypoint.sh"),
            ],
            args:vec![
                String::from("--storage_address"),
                String::from("$(MRD_STORAGE_URI)"),
            ],
            cpu:String::from("3000m"),
            endpoint_name:String::from("gadgetron"),
            endpoint_port:9002,
            endpoint_env_command:String::from("printenv TYGER_GADGETRON_WORKER_ENDPOINT_ADDRESSES"),
        }
    }
}

#[derive(Clone,Debug,Serialize,Deserialize,PartialEq)]
pub struct GeneratorSettings {
    /// root that case directories and manifest paths are relative to
    pub data_root:PathBuf,
    pub noise_template:PathBuf,
    pub main_template:PathBuf,
    pub noise_placeholder:String,
    pub main_placeholder:String,
    pub high_memory_cases:Vec<String>,
    pub high_memory_surcharge_gb:u64,
    pub worker:WorkerSettings,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            data_root:PathBuf::from("data"),
            noise_template:PathBuf::from("templates/gadgetron_noise.yml"),
            main_template:PathBuf::from("templates/gadgetron_main.yml"),
            noise_placeholder:NOISE_PLACEHOLDER.to_string(),
            main_placeholder:MAIN_PLACEHOLDER.to_string(),
            high_memory_cases:HIGH_MEMORY_CASES.iter().map(|c| c.to_string()).collect(),
            high_memory_surcharge_gb:HIGH_MEMORY_SURCHARGE_GB,
            worker:WorkerSettings::default(),
        }
    }
}

impl ConfigFile for GeneratorSettings {

    fn to_file(&self,filename:&Path) -> Result<()> {
        let t = toml::to_string_pretty(&self)?;
        utils::write_to_file(filename,&Self::file_ext(),&t)?;
        Ok(())
    }

    /// relative paths in the file are taken relative to the file's directory
    fn from_file(filename:&Path) -> Result<Self> {
        let t = utils::read_to_string(filename,&Self::file_ext())?;
        let s:Self = toml::from_str(&t).map_err(|source| Error::Settings { path:filename.with_extension(Self::file_ext()), source })?;
        let base = filename.parent().unwrap_or(Path::new(""));
        Ok(s.relative_to(base))
    }

    fn file_ext() -> String {
        String::from("case_gen")
    }
}

impl GeneratorSettings {

    pub fn relative_to(mut self,base:&Path) -> Self {
        for p in [&mut self.data_root,&mut self.noise_template,&mut self.main_template] {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        }
        self
    }

    pub fn is_high_memory(&self,case_name:&str) -> bool {
        self.high_memory_cases.iter().any(|c| c == case_name)
    }
}
