use std::path::Path;
use serde::Serialize;
use crate::case_file::CaseFile;
use crate::error::Result;

pub const CASE_FILE_EXT:&str = "cfg";
pub const DEFAULT_THRESHOLD:f64 = 0.01;

pub const DEPENDENCY_CLIENT:&str = "dependency.client";
pub const RECONSTRUCTION_CLIENT:&str = "reconstruction.client";
pub const RECONSTRUCTION_TEST:&str = "reconstruction.test";
pub const REQUIREMENTS:&str = "requirements";
pub const DISTRIBUTED:&str = "distributed";
pub const TAGS:&str = "tags";

#[derive(Clone,Debug,PartialEq,Serialize)]
pub struct DependencyClientConfig {
    pub configuration:String,
}

#[derive(Clone,Debug,PartialEq,Serialize)]
pub struct ReconstructionClientConfig {
    pub configuration:String,
    pub additional_arguments:String,
}

#[derive(Clone,Debug,PartialEq,Serialize)]
pub struct ReconstructionTestConfig {
    pub output_images:String,
    pub reference_file:String,
    pub reference_images:String,
    pub scale_comparison_threshold:f64,
    pub value_comparison_threshold:f64,
    pub disable_image_header_test:bool,
    pub disable_image_meta_test:bool,
}

#[derive(Clone,Debug,Default,PartialEq,Serialize)]
pub struct RequirementConfig {
    pub gpu_support:bool,
    pub julia_support:bool,
    pub matlab_support:bool,
    pub python_support:bool,
    /// MB
    pub gpu_memory:u64,
    /// MB
    pub system_memory:u64,
}

#[derive(Clone,Debug,PartialEq,Serialize)]
pub struct DistributedConfig {
    pub nodes:u32,
}

/// One Gadgetron integration test case, as described by its `.cfg` file
#[derive(Clone,Debug,PartialEq,Serialize)]
pub struct TestCase {
    /// the case file name, e.g. `epi_2d.cfg`
    pub name:String,
    pub dependency_client:Option<DependencyClientConfig>,
    pub reconstruction_client:Option<ReconstructionClientConfig>,
    pub distributed:Option<DistributedConfig>,
    pub requirements:RequirementConfig,
    pub reconstruction_tests:Vec<ReconstructionTestConfig>,
    pub tags:Option<String>,
}

impl TestCase {

    pub fn open(case_file:&Path) -> Result<Self> {
        let f = CaseFile::open(case_file)?;
        Self::from_case_file(&f)
    }

    pub fn parse(name:&str,text:&str) -> Result<Self> {
        let f = CaseFile::parse(name,text)?;
        Self::from_case_file(&f)
    }

    pub fn from_case_file(f:&CaseFile) -> Result<Self> {

        let dependency_client = match f.section(DEPENDENCY_CLIENT) {
            Some(s) => {
                let mut r = f.reader(s);
                let configuration = r.required("configuration")?.to_string();
                r.finish()?;
                Some(DependencyClientConfig { configuration })
            }
            None => None,
        };

        let reconstruction_client = match f.section(RECONSTRUCTION_CLIENT) {
            Some(s) => {
                let mut r = f.reader(s);
                let configuration = r.required("configuration")?.to_string();
                let additional_arguments = r.optional("additional_arguments").unwrap_or_default().to_string();
                r.finish()?;
                Some(ReconstructionClientConfig { configuration, additional_arguments })
            }
            None => None,
        };

        let mut reconstruction_tests = vec![];
        for s in f.sections_containing(RECONSTRUCTION_TEST) {
            let mut r = f.reader(s);
            let t = ReconstructionTestConfig {
                output_images:r.required("output_images")?.to_string(),
                reference_file:r.required("reference_file")?.to_string(),
                reference_images:r.required("reference_images")?.to_string(),
                scale_comparison_threshold:r.parsed("scale_comparison_threshold",DEFAULT_THRESHOLD)?,
                value_comparison_threshold:r.parsed("value_comparison_threshold",DEFAULT_THRESHOLD)?,
                disable_image_header_test:r.boolean("disable_image_header_test",false)?,
                disable_image_meta_test:r.boolean("disable_image_meta_test",false)?,
            };
            r.finish()?;
            reconstruction_tests.push(t);
        }

        let requirements = match f.section(REQUIREMENTS) {
            Some(s) => {
                let mut r = f.reader(s);
                let req = RequirementConfig {
                    gpu_support:r.boolean("gpu_support",false)?,
                    julia_support:r.boolean("julia_support",false)?,
                    matlab_support:r.boolean("matlab_support",false)?,
                    python_support:r.boolean("python_support",false)?,
                    gpu_memory:r.parsed("gpu_memory",0)?,
                    system_memory:r.parsed("system_memory",0)?,
                };
                r.finish()?;
                req
            }
            None => RequirementConfig::default(),
        };

        let distributed = match f.section(DISTRIBUTED) {
            Some(s) => {
                let mut r = f.reader(s);
                let nodes = r.parsed_required("nodes")?;
                r.finish()?;
                Some(DistributedConfig { nodes })
            }
            None => None,
        };

        let tags = match f.section(TAGS) {
            Some(s) => {
                let mut r = f.reader(s);
                let tags = r.required("tags")?.to_string();
                r.finish()?;
                Some(tags)
            }
            None => None,
        };

        Ok(Self {
            name:f.name().to_string(),
            dependency_client,
            reconstruction_client,
            distributed,
            requirements,
            reconstruction_tests,
            tags,
        })
    }

    /// name without the `.cfg` extension
    pub fn stem(&self) -> &str {
        self.name.strip_suffix(&format!(".{CASE_FILE_EXT}")).unwrap_or(&self.name)
    }

    /// matlab and julia gadgets are not available to the cloud runner
    pub fn is_supported(&self) -> bool {
        !self.requirements.matlab_support && !self.requirements.julia_support
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const GRAPPA:&str = "\
[dependency.siemens]
data_file=tse/meas_MID00450_FID76726_SAX_TE62_DIR_TSE/meas_MID00450_FID76726_SAX_TE62_DIR_TSE.dat
measurement=1

[dependency.client]
configuration=default_measurement_dependencies.xml

[reconstruction.siemens]
data_file=tse/meas_MID00450_FID76726_SAX_TE62_DIR_TSE/meas_MID00450_FID76726_SAX_TE62_DIR_TSE.dat
measurement=2

[reconstruction.client]
configuration=Generic_Cartesian_Grappa.xml

[reconstruction.test]
reference_file=tse/meas_MID00450_FID76726_SAX_TE62_DIR_TSE/ref_20210924.mrd
reference_images=Generic_Cartesian_Grappa.xml/image_1
output_images=Generic_Cartesian_Grappa.xml/image_1
value_comparison_threshold=0.02

[reconstruction.test.2]
reference_file=tse/ref_2.mrd
reference_images=image_2
output_images=image_2
disable_image_meta_test=yes

[requirements]
system_memory=4096
gpu_support=1

[distributed]
nodes=2

[tags]
tags=fast,grappa
";

    #[test]
    fn parse_full_case() {
        let c = TestCase::parse("generic_grappa_snr_R1.cfg",GRAPPA).unwrap();
        assert_eq!(c.name,"generic_grappa_snr_R1.cfg");
        assert_eq!(c.stem(),"generic_grappa_snr_R1");
        assert_eq!(c.dependency_client.as_ref().unwrap().configuration,"default_measurement_dependencies.xml");
        let recon = c.reconstruction_client.as_ref().unwrap();
        assert_eq!(recon.configuration,"Generic_Cartesian_Grappa.xml");
        assert_eq!(recon.additional_arguments,"");
        assert_eq!(c.reconstruction_tests.len(),2);
        let t = &c.reconstruction_tests[0];
        assert_eq!(t.scale_comparison_threshold,DEFAULT_THRESHOLD);
        assert_eq!(t.value_comparison_threshold,0.02);
        assert!(!t.disable_image_meta_test);
        assert!(c.reconstruction_tests[1].disable_image_meta_test);
        assert_eq!(c.requirements.system_memory,4096);
        assert!(c.requirements.gpu_support);
        assert_eq!(c.distributed.as_ref().unwrap().nodes,2);
        assert_eq!(c.tags.as_deref(),Some("fast,grappa"));
        assert!(c.is_supported());
    }

    #[test]
    fn minimal_case_uses_defaults() {
        let c = TestCase::parse("x.cfg","[reconstruction.client]\nconfiguration=default.xml\n").unwrap();
        assert!(c.dependency_client.is_none());
        assert!(c.reconstruction_tests.is_empty());
        assert_eq!(c.requirements,RequirementConfig::default());
        assert!(c.distributed.is_none());
    }

    #[test]
    fn matlab_cases_are_unsupported() {
        let c = TestCase::parse("m.cfg","[requirements]\nmatlab_support=true\n").unwrap();
        assert!(!c.is_supported());
        let c = TestCase::parse("j.cfg","[requirements]\njulia_support=on\n").unwrap();
        assert!(!c.is_supported());
    }

    #[test]
    fn field_errors() {
        let unknown = TestCase::parse("x.cfg","[reconstruction.client]\nconfiguration=a.xml\nextra=1\n");
        assert!(matches!(unknown,Err(Error::Field { .. })));
        let missing = TestCase::parse("x.cfg","[distributed]\n");
        assert!(matches!(missing,Err(Error::Field { .. })));
        let bad_number = TestCase::parse("x.cfg","[requirements]\nsystem_memory=lots\n");
        assert!(matches!(bad_number,Err(Error::Field { .. })));
    }
}
