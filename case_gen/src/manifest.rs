use std::path::Path;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::{Error, Result};
use crate::generator::FileDependencies;

pub const TESTDATA_FILE:&str = "testdata.json";

#[derive(Clone,Debug,Serialize,Deserialize,PartialEq)]
pub struct CaseMetadata {
    pub name:String,
    /// `case.yml` relative to the data root
    pub case_file_path:String,
    pub file_dependencies:FileDependencies,
}

impl CaseMetadata {

    /// every dependency must exist under `data_root` with its recorded digest
    pub fn validate(&self,data_root:&Path) -> Result<()> {
        if !self.file_dependencies.contains_key(&self.case_file_path) {
            return Err(Error::MissingDependency {
                case:self.name.clone(),
                path:self.case_file_path.clone(),
            });
        }
        for (rel,digest) in &self.file_dependencies {
            utils::validate_md5(&data_root.join(rel),digest)?;
        }
        debug!("{} is valid",self.name);
        Ok(())
    }
}

/// The `testdata.json` manifest at the data root
#[derive(Clone,Debug,Default,Serialize,Deserialize,PartialEq)]
pub struct TestData {
    #[serde(default)]
    pub cases:Vec<CaseMetadata>,
}

impl TestData {

    /// an absent manifest is an empty one
    pub fn read(data_root:&Path) -> Result<Self> {
        let file = data_root.join(TESTDATA_FILE);
        if !file.exists() {
            return Ok(Self::default());
        }
        let text = utils::read_file_to_string(&file)?;
        serde_json::from_str(&text).map_err(|source| Error::Json { path:file, source })
    }

    /// cases are written sorted by name
    pub fn write(&mut self,data_root:&Path) -> Result<()> {
        self.cases.sort_by(|a,b| a.name.cmp(&b.name));
        std::fs::create_dir_all(data_root).map_err(|e| utils::Error::io(data_root,e))?;
        let file = data_root.join(TESTDATA_FILE);
        let mut bytes = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut bytes,formatter);
        self.serialize(&mut ser).map_err(|source| Error::Json { path:file.clone(), source })?;
        bytes.push(b'\n');
        utils::write_file(&file,&bytes)?;
        Ok(())
    }

    pub fn get(&self,name:&str) -> Option<&CaseMetadata> {
        self.cases.iter().find(|c| c.name == name)
    }

    pub fn remove(&mut self,name:&str) -> Option<CaseMetadata> {
        let i = self.cases.iter().position(|c| c.name == name)?;
        Some(self.cases.remove(i))
    }

    /// insert or replace by name
    pub fn upsert(&mut self,meta:CaseMetadata) {
        self.remove(&meta.name);
        self.cases.push(meta);
    }
}
