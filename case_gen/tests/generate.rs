use std::fs;
use std::path::{Path, PathBuf};
use serde_yaml::Value;
use case_gen::generator::{DescriptionGenerator, CASE_FILE, RUN_MAIN_FILE, RUN_NOISE_FILE};
use case_gen::manifest::{TestData, TESTDATA_FILE};
use case_gen::orchestrator::{discover_cases, Orchestrator};
use case_gen::settings::GeneratorSettings;
use case_gen::test_case::TestCase;
use case_gen::Error;

const NOISE_TEMPLATE:&str = "\
job:
  codespec: noise
tyger:
  job:
    image: eminencepublic.azurecr.io/gadgetron:current
    args:
      - -c
      - default_measurement_dependencies.xml
      - --keep
      - default.xml
";

const MAIN_TEMPLATE:&str = "\
job:
  codespec: main
tyger:
  job:
    image: eminencepublic.azurecr.io/gadgetron:current
    args:
      - --input
      - $(INPUT_PIPE)
      - -c
      - default.xml
      - --config_name
      - default.xml
    resources:
      requests:
        cpu: 2000m
";

const GRAPPA_CASE:&str = "\
[dependency.client]
configuration=default_measurement_dependencies_ismrmrd_storage.xml

[reconstruction.client]
configuration=Generic_Cartesian_Grappa.xml

[reconstruction.test]
reference_file=tse/ref_20210924.mrd
reference_images=Generic_Cartesian_Grappa.xml/image_1
output_images=Generic_Cartesian_Grappa.xml/image_1
scale_comparison_threshold=0.05

[requirements]
system_memory=2049
gpu_support=true
";

const DISTRIBUTED_CASE:&str = "\
[reconstruction.client]
configuration=Generic_Cartesian_Grappa_distributed.xml

[requirements]
system_memory=2048

[distributed]
nodes=2
";

fn settings(dir:&Path) -> GeneratorSettings {
    let templates = dir.join("templates");
    fs::create_dir_all(&templates).unwrap();
    fs::write(templates.join("noise.yml"),NOISE_TEMPLATE).unwrap();
    fs::write(templates.join("main.yml"),MAIN_TEMPLATE).unwrap();
    let mut s = GeneratorSettings::default();
    s.data_root = dir.join("data");
    s.noise_template = templates.join("noise.yml");
    s.main_template = templates.join("main.yml");
    s
}

fn write_case(dir:&Path,name:&str,text:&str) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let p = dir.join(name);
    fs::write(&p,text).unwrap();
    p
}

fn yaml(p:&Path) -> Value {
    serde_yaml::from_str(&fs::read_to_string(p).unwrap()).unwrap()
}

fn strings(v:&Value) -> Vec<String> {
    v.as_sequence().unwrap().iter().map(|a| a.as_str().unwrap().to_string()).collect()
}

#[test]
fn generates_noise_main_and_case_files() {
    let dir = tempfile::tempdir().unwrap();
    let g = DescriptionGenerator::new(settings(dir.path()));
    let case = TestCase::parse("generic_grappa_snr.cfg",GRAPPA_CASE).unwrap();
    let case_dir = g.case_dir(&case);
    let deps = g.generate(&case,&case_dir).unwrap();

    let keys:Vec<&str> = deps.keys().map(|k| k.as_str()).collect();
    assert_eq!(keys,vec![
        "generic_grappa_snr/case.yml",
        "generic_grappa_snr/run_main.yml",
        "generic_grappa_snr/run_noise.yml",
    ]);
    for (rel,digest) in &deps {
        let bytes = fs::read(dir.path().join("data").join(rel)).unwrap();
        assert_eq!(&utils::md5_hex(&bytes),digest);
    }

    let noise = yaml(&case_dir.join(RUN_NOISE_FILE));
    assert_eq!(
        strings(&noise["tyger"]["job"]["args"]),
        vec!["-c","default_measurement_dependencies_ismrmrd_storage.xml","--keep","default.xml"],
    );
    assert_eq!(noise["job"]["codespec"].as_str(),Some("noise"));

    let main = yaml(&case_dir.join(RUN_MAIN_FILE));
    assert_eq!(
        strings(&main["tyger"]["job"]["args"]),
        vec!["--input","$(INPUT_PIPE)","-c","Generic_Cartesian_Grappa.xml","--config_name","Generic_Cartesian_Grappa.xml"],
    );
    let res = &main["tyger"]["job"]["resources"];
    assert_eq!(res["requests"]["cpu"].as_str(),Some("2000m"));
    assert_eq!(res["requests"]["memory"].as_str(),Some("3G"));
    assert_eq!(res["limits"]["memory"].as_str(),Some("3G"));
    assert_eq!(res["gpu"].as_str(),Some("1"));
    assert!(main["tyger"].get("worker").is_none());

    let summary = yaml(&case_dir.join(CASE_FILE));
    let c = &summary["case"];
    assert_eq!(c["name"].as_str(),Some("generic_grappa_snr.cfg"));
    let run_main = case_dir.join(RUN_MAIN_FILE);
    assert_eq!(c["main"]["run_file_path"].as_str(),run_main.to_str());
    assert_eq!(c["main"]["dat_file_path"].as_str(),case_dir.join("main.h5").to_str());
    assert_eq!(c["noise"]["dat_file_path"].as_str(),case_dir.join("noise.h5").to_str());
    let image = &c["validation"]["images"]["Generic_Cartesian_Grappa.xml/image_1"];
    assert_eq!(image["reference_file_path"].as_str(),case_dir.join("tse/ref_20210924.mrd").to_str());
    assert_eq!(image["scale_comparison_threshold"].as_f64(),Some(0.05));
    assert_eq!(image["value_comparison_threshold"].as_f64(),Some(0.01));
}

#[test]
fn template_key_order_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let g = DescriptionGenerator::new(settings(dir.path()));
    let case = TestCase::parse("order.cfg",GRAPPA_CASE).unwrap();
    let case_dir = g.case_dir(&case);
    g.generate(&case,&case_dir).unwrap();
    let text = fs::read_to_string(case_dir.join(RUN_NOISE_FILE)).unwrap();
    let job = text.find("codespec").unwrap();
    let image = text.find("image").unwrap();
    let args = text.find("args").unwrap();
    assert!(job < image && image < args);
}

#[test]
fn distributed_case_gets_workers() {
    let dir = tempfile::tempdir().unwrap();
    let g = DescriptionGenerator::new(settings(dir.path()));
    let case = TestCase::parse("generic_grappa_distributed.cfg",DISTRIBUTED_CASE).unwrap();
    let case_dir = g.case_dir(&case);
    let deps = g.generate(&case,&case_dir).unwrap();
    assert!(!deps.keys().any(|k| k.ends_with(RUN_NOISE_FILE)));

    let main = yaml(&case_dir.join(RUN_MAIN_FILE));
    let w = &main["tyger"]["worker"];
    assert_eq!(w["image"].as_str(),Some("eminencepublic.azurecr.io/gadgetron:current"));
    assert_eq!(w["replicas"].as_u64(),Some(2));
    assert_eq!(strings(&w["command"]),vec!["/tini","--","/opt/entrypoint.sh"]);
    assert_eq!(strings(&w["args"]),vec!["--storage_address","$(MRD_STORAGE_URI)"]);
    assert_eq!(w["resources"]["requests"]["memory"].as_str(),Some("2G"));
    assert_eq!(w["endpoints"]["gadgetron"].as_u64(),Some(9002));
    assert_eq!(
        main["tyger"]["job"]["env"]["GADGETRON_REMOTE_WORKER_COMMAND"].as_str(),
        Some("printenv TYGER_GADGETRON_WORKER_ENDPOINT_ADDRESSES"),
    );
    assert!(main["tyger"]["job"]["resources"].get("gpu").is_none());

    let summary = yaml(&case_dir.join(CASE_FILE));
    assert!(summary["case"].get("noise").is_none());
}

#[test]
fn high_memory_case_gets_surcharge() {
    let dir = tempfile::tempdir().unwrap();
    let g = DescriptionGenerator::new(settings(dir.path()));
    let case = TestCase::parse("epi_2d.cfg",DISTRIBUTED_CASE).unwrap();
    let case_dir = g.case_dir(&case);
    g.generate(&case,&case_dir).unwrap();
    let main = yaml(&case_dir.join(RUN_MAIN_FILE));
    assert_eq!(main["tyger"]["job"]["resources"]["limits"]["memory"].as_str(),Some("6G"));
    assert_eq!(main["tyger"]["worker"]["resources"]["limits"]["memory"].as_str(),Some("6G"));
}

#[test]
fn generation_is_reproducible() {
    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    let case = TestCase::parse("generic_grappa_snr.cfg",GRAPPA_CASE).unwrap();

    let ga = DescriptionGenerator::new(settings(a.path()));
    let gb = DescriptionGenerator::new(settings(b.path()));
    let da = ga.generate(&case,&ga.case_dir(&case)).unwrap();
    let db = gb.generate(&case,&gb.case_dir(&case)).unwrap();
    let noise_a = fs::read(ga.case_dir(&case).join(RUN_NOISE_FILE)).unwrap();
    let noise_b = fs::read(gb.case_dir(&case).join(RUN_NOISE_FILE)).unwrap();
    assert_eq!(noise_a,noise_b);
    let main_a = fs::read(ga.case_dir(&case).join(RUN_MAIN_FILE)).unwrap();
    let main_b = fs::read(gb.case_dir(&case).join(RUN_MAIN_FILE)).unwrap();
    assert_eq!(main_a,main_b);
    assert_eq!(da[&format!("generic_grappa_snr/{RUN_MAIN_FILE}")],db[&format!("generic_grappa_snr/{RUN_MAIN_FILE}")]);

    // regenerating in place changes nothing
    let again = ga.generate(&case,&ga.case_dir(&case)).unwrap();
    assert_eq!(again,da);
}

#[test]
fn discovery_skips_bad_cases_and_unsupported_ones() {
    let dir = tempfile::tempdir().unwrap();
    let cases_dir = dir.path().join("cases");
    write_case(&cases_dir,"b_grappa.cfg",GRAPPA_CASE);
    write_case(&cases_dir,"a_distributed.cfg",DISTRIBUTED_CASE);
    write_case(&cases_dir,"c_matlab.cfg","[requirements]\nmatlab_support=1\n");
    write_case(&cases_dir,"d_unknown_key.cfg","[reconstruction.client]\nconfiguration=a.xml\nbogus=1\n");
    write_case(&cases_dir,"notes.txt","not a case");

    let cases = discover_cases(&cases_dir).unwrap();
    let names:Vec<&str> = cases.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names,vec!["a_distributed.cfg","b_grappa.cfg"]);

    write_case(&cases_dir,"e_broken.cfg","configuration=outside\n");
    assert!(matches!(discover_cases(&cases_dir),Err(Error::Syntax { .. })));
}

#[test]
fn orchestrator_keeps_valid_and_regenerates_failing_cases() {
    let dir = tempfile::tempdir().unwrap();
    let s = settings(dir.path());
    let data_root = s.data_root.clone();
    let cases = vec![
        TestCase::parse("generic_grappa_snr.cfg",GRAPPA_CASE).unwrap(),
        TestCase::parse("distributed.cfg",DISTRIBUTED_CASE).unwrap(),
    ];

    let mut o = Orchestrator::new(s.clone()).unwrap();
    let first = o.run(&cases).unwrap();
    assert!(first.kept.is_empty());
    assert_eq!(first.generated.len(),2);
    assert!(data_root.join(TESTDATA_FILE).exists());

    let td = TestData::read(&data_root).unwrap();
    let names:Vec<&str> = td.cases.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names,vec!["distributed.cfg","generic_grappa_snr.cfg"]);
    assert_eq!(td.cases[1].case_file_path,"generic_grappa_snr/case.yml");

    // tamper with one case
    fs::write(data_root.join("generic_grappa_snr").join(RUN_MAIN_FILE),"tampered").unwrap();
    let mut o = Orchestrator::new(s.clone()).unwrap();
    assert_eq!(o.validate_all().len(),1);
    let second = o.run(&cases).unwrap();
    assert_eq!(second.kept,vec!["distributed.cfg"]);
    assert_eq!(second.generated,vec!["generic_grappa_snr.cfg"]);

    let o = Orchestrator::new(s).unwrap();
    assert!(o.validate_all().is_empty());
    assert_eq!(TestData::read(&data_root).unwrap(),td);
}

#[test]
fn regenerated_case_directory_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let s = settings(dir.path());
    let case_dir = s.data_root.join("distributed");
    let cases = vec![TestCase::parse("distributed.cfg",DISTRIBUTED_CASE).unwrap()];
    Orchestrator::new(s.clone()).unwrap().run(&cases).unwrap();
    assert!(!case_dir.join(RUN_NOISE_FILE).exists());

    // leftovers from an older generation plus a corrupted file
    fs::write(case_dir.join(RUN_NOISE_FILE),"stale").unwrap();
    fs::write(case_dir.join(RUN_MAIN_FILE),"tampered").unwrap();
    let summary = Orchestrator::new(s.clone()).unwrap().run(&cases).unwrap();
    assert_eq!(summary.generated,vec!["distributed.cfg"]);
    assert!(!case_dir.join(RUN_NOISE_FILE).exists());
    assert!(case_dir.join(RUN_MAIN_FILE).exists());
    assert!(Orchestrator::new(s).unwrap().validate_all().is_empty());
}
