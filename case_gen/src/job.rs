use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use crate::error::{Error, Result};
use crate::settings::{GeneratorSettings, WorkerSettings};

/// A tyger run file template. Only `tyger.job.args` is required; everything
/// else is carried through untouched and in its original order.
#[derive(Clone,Debug)]
pub struct JobTemplate {
    path:PathBuf,
    doc:Value,
}

/// memory and gpu overrides for the job's resource block
#[derive(Clone,Debug,PartialEq)]
pub struct ResourceRequest {
    pub memory:String,
    pub gpu:bool,
}

#[derive(Serialize)]
struct MemorySpec<'a> {
    memory:&'a str,
}

#[derive(Serialize)]
struct WorkerRequests<'a> {
    cpu:&'a str,
    memory:&'a str,
}

#[derive(Serialize)]
struct WorkerResources<'a> {
    requests:WorkerRequests<'a>,
    limits:MemorySpec<'a>,
}

#[derive(Serialize)]
struct WorkerSpec<'a> {
    image:&'a str,
    replicas:u32,
    nodepool:&'a str,
    command:&'a [String],
    args:&'a [String],
    resources:WorkerResources<'a>,
    endpoints:BTreeMap<&'a str,u16>,
}

impl JobTemplate {

    pub fn load(path:&Path) -> Result<Self> {
        let text = utils::read_file_to_string(path)?;
        Self::parse(path,&text)
    }

    /// `path` only labels errors
    pub fn parse(path:&Path,text:&str) -> Result<Self> {
        let doc:Value = serde_yaml::from_str(text).map_err(|source| Error::Yaml { path:path.to_owned(), source })?;
        let t = Self { path:path.to_owned(), doc };
        t.args()?;
        Ok(t)
    }

    fn template_error(&self,message:&str) -> Error {
        Error::Template { path:self.path.clone(), message:message.to_string() }
    }

    pub fn args(&self) -> Result<&Vec<Value>> {
        match self.doc.get("tyger").and_then(|t| t.get("job")).and_then(|j| j.get("args")) {
            Some(Value::Sequence(args)) => Ok(args),
            _ => Err(self.template_error("tyger.job.args must be a sequence")),
        }
    }

    fn args_mut(&mut self) -> Result<&mut Vec<Value>> {
        let err = self.template_error("tyger.job.args must be a sequence");
        match self.doc.get_mut("tyger").and_then(|t| t.get_mut("job")).and_then(|j| j.get_mut("args")) {
            Some(Value::Sequence(args)) => Ok(args),
            _ => Err(err),
        }
    }

    fn tyger_mut(&mut self) -> Result<&mut Mapping> {
        let err = self.template_error("tyger must be a mapping");
        match self.doc.get_mut("tyger") {
            Some(Value::Mapping(m)) => Ok(m),
            _ => Err(err),
        }
    }

    fn job_mut(&mut self) -> Result<&mut Value> {
        let err = self.template_error("tyger.job must be a mapping");
        match self.doc.get_mut("tyger").and_then(|t| t.get_mut("job")) {
            Some(job) if job.is_mapping() => Ok(job),
            _ => Err(err),
        }
    }

    /// Replace args that are exactly `placeholder` with `value`. Returns the number replaced.
    pub fn substitute_placeholder(&mut self,placeholder:&str,value:&str) -> Result<usize> {
        let mut n = 0;
        for arg in self.args_mut()?.iter_mut() {
            if arg.as_str() == Some(placeholder) {
                *arg = Value::String(value.to_string());
                n += 1;
            }
        }
        Ok(n)
    }

    pub fn apply_resources(&mut self,request:&ResourceRequest) -> Result<()> {
        let mut resources = Mapping::new();
        resources.insert("requests".into(),self.to_value(&MemorySpec { memory:&request.memory })?);
        resources.insert("limits".into(),self.to_value(&MemorySpec { memory:&request.memory })?);
        if request.gpu {
            resources.insert("gpu".into(),Value::String(String::from("1")));
        }
        let mut overlay = Mapping::new();
        overlay.insert("resources".into(),Value::Mapping(resources));
        merge(self.job_mut()?,Value::Mapping(overlay));
        Ok(())
    }

    /// add a worker group of `replicas` gadgetron instances and point the job at it
    pub fn add_workers(&mut self,worker:&WorkerSettings,replicas:u32,memory:&str) -> Result<()> {
        let group = WorkerSpec {
            image:&worker.image,
            replicas,
            nodepool:&worker.nodepool,
            command:&worker.command,
            args:&worker.args,
            resources:WorkerResources {
                requests:WorkerRequests { cpu:&worker.cpu, memory },
                limits:MemorySpec { memory },
            },
            endpoints:BTreeMap::from([(worker.endpoint_name.as_str(),worker.endpoint_port)]),
        };
        let group = self.to_value(&group)?;
        self.tyger_mut()?.insert("worker".into(),group);

        let mut env = Mapping::new();
        env.insert("GADGETRON_REMOTE_WORKER_COMMAND".into(),Value::String(worker.endpoint_env_command.clone()));
        let mut overlay = Mapping::new();
        overlay.insert("env".into(),Value::Mapping(env));
        merge(self.job_mut()?,Value::Mapping(overlay));
        Ok(())
    }

    fn to_value<T:Serialize>(&self,v:&T) -> Result<Value> {
        serde_yaml::to_value(v).map_err(|source| Error::Yaml { path:self.path.clone(), source })
    }

    pub fn value(&self) -> &Value {
        &self.doc
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(&self.doc).map_err(|source| Error::Yaml { path:self.path.clone(), source })
    }
}

/// Merge `overlay` into `target`. Mappings merge key by key and keep the keys
/// `overlay` does not mention; anything else in `overlay` replaces the target value.
pub fn merge(target:&mut Value,overlay:Value) {
    match (target,overlay) {
        (Value::Mapping(t),Value::Mapping(o)) => {
            for (k,v) in o {
                match t.get_mut(&k) {
                    Some(existing) => merge(existing,v),
                    None => {
                        t.insert(k,v);
                    }
                }
            }
        }
        (t,o) => *t = o,
    }
}

/// whole GB rounded up, plus the surcharge for known memory hungry cases
pub fn memory_requirement(case_name:&str,system_memory_mb:u64,settings:&GeneratorSettings) -> String {
    let mut gb = system_memory_mb.div_ceil(1024);
    if settings.is_high_memory(case_name) {
        gb = gb.saturating_add(settings.high_memory_surcharge_gb);
    }
    format!("{}G",gb)
}
