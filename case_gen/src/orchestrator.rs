use std::path::Path;
use tracing::{info, warn};
use crate::error::{Error, Result};
use crate::generator::{DescriptionGenerator, CASE_FILE};
use crate::manifest::{CaseMetadata, TestData};
use crate::settings::GeneratorSettings;
use crate::test_case::{TestCase, CASE_FILE_EXT};

/// Parse every `*.cfg` in `cases_dir`, sorted by file name. Files with bad or missing
/// keys are skipped; a file that is not valid INI aborts discovery.
pub fn discover_cases(cases_dir:&Path) -> Result<Vec<TestCase>> {
    let files = utils::get_all_matches(cases_dir,&format!("*.{CASE_FILE_EXT}"))?;
    let mut cases = vec![];
    for f in files {
        match TestCase::open(&f) {
            Ok(case) => cases.push(case),
            Err(e @ Error::Field { .. }) => warn!("skipping {}: {}",f.display(),e),
            Err(e) => return Err(e),
        }
    }
    let found = cases.len();
    cases.retain(|c| {
        if !c.is_supported() {
            info!("{} requires matlab or julia and is excluded",c.name);
        }
        c.is_supported()
    });
    info!("found {} test cases in {}, {} supported",found,cases_dir.display(),cases.len());
    Ok(cases)
}

/// Keeps `testdata.json` in step with a set of test cases
pub struct Orchestrator {
    generator:DescriptionGenerator,
    testdata:TestData,
}

#[derive(Clone,Debug,Default,PartialEq)]
pub struct RunSummary {
    pub kept:Vec<String>,
    pub generated:Vec<String>,
}

impl Orchestrator {

    pub fn new(settings:GeneratorSettings) -> Result<Self> {
        let testdata = TestData::read(&settings.data_root)?;
        Ok(Self { generator:DescriptionGenerator::new(settings), testdata })
    }

    pub fn testdata(&self) -> &TestData {
        &self.testdata
    }

    /// Validate the cases already in the manifest, regenerate the ones that fail along
    /// with any new ones, then write the manifest back.
    pub fn run(&mut self,cases:&[TestCase]) -> Result<RunSummary> {
        let data_root = self.generator.settings().data_root.clone();
        let mut summary = RunSummary::default();
        let mut pending = vec![];

        for case in cases {
            match self.testdata.get(&case.name) {
                Some(meta) => match meta.validate(&data_root) {
                    Ok(()) => summary.kept.push(case.name.clone()),
                    Err(e) => {
                        warn!("{} failed validation and will be regenerated: {}",case.name,e);
                        self.testdata.remove(&case.name);
                        let case_dir = self.generator.case_dir(case);
                        if case_dir.exists() {
                            std::fs::remove_dir_all(&case_dir).map_err(|e| utils::Error::io(&case_dir,e))?;
                        }
                        pending.push(case);
                    }
                },
                None => pending.push(case),
            }
        }

        for case in pending {
            let meta = self.generate_case(case)?;
            self.testdata.upsert(meta);
            summary.generated.push(case.name.clone());
        }

        self.testdata.write(&data_root)?;
        info!("{} cases kept, {} generated",summary.kept.len(),summary.generated.len());
        Ok(summary)
    }

    fn generate_case(&self,case:&TestCase) -> Result<CaseMetadata> {
        let case_dir = self.generator.case_dir(case);
        info!("generating {} in {}",case.name,case_dir.display());
        let file_dependencies = self.generator.generate(case,&case_dir)?;
        Ok(CaseMetadata {
            name:case.name.clone(),
            case_file_path:self.generator.dependency_key(&case_dir.join(CASE_FILE))?,
            file_dependencies,
        })
    }

    /// names of manifest cases that fail validation
    pub fn validate_all(&self) -> Vec<(String,Error)> {
        let data_root = &self.generator.settings().data_root;
        self.testdata.cases.iter()
            .filter_map(|meta| meta.validate(data_root).err().map(|e| (meta.name.clone(),e)))
            .collect()
    }
}
