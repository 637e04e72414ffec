use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use crate::error::{Error, Result};

/// An INI style Gadgetron test case file (`[section]` headers, `key = value` lines).
#[derive(Clone,Debug,Default)]
pub struct CaseFile {
    name:String,
    sections:Vec<Section>,
}

#[derive(Clone,Debug,Default,PartialEq)]
pub struct Section {
    pub name:String,
    pub items:HashMap<String,String>,
}

impl CaseFile {

    pub fn open(file_path:&Path) -> Result<Self> {
        let name = file_path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let text = utils::read_file_to_string(file_path)?;
        Self::parse(&name,&text)
    }

    pub fn parse(name:&str,text:&str) -> Result<Self> {
        let syntax = |line:usize,message:String| Error::Syntax { case:name.to_string(), line, message };
        let mut sections = Vec::<Section>::new();
        // last key written, for continuation lines
        let mut last_key:Option<String> = None;

        for (i,raw_line) in text.lines().enumerate() {
            let line_no = i + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            // indented lines continue the previous value
            if raw_line.starts_with(|c:char| c.is_whitespace()) {
                if let (Some(section),Some(key)) = (sections.last_mut(),&last_key) {
                    if let Some(val) = section.items.get_mut(key) {
                        val.push('\n');
                        val.push_str(line);
                        continue;
                    }
                }
            }

            if line.starts_with('[') {
                let header = line.strip_suffix(']').ok_or_else(|| syntax(line_no,format!("unterminated section header {line}")))?;
                let section_name = header[1..].trim().to_string();
                if sections.iter().any(|s| s.name == section_name) {
                    return Err(syntax(line_no,format!("duplicate section [{section_name}]")));
                }
                sections.push(Section { name:section_name, items:HashMap::new() });
                last_key = None;
                continue;
            }

            // split on the first delimiter we find
            let index = line.find(|c| c == '=' || c == ':').ok_or_else(|| syntax(line_no,format!("expected key = value, found {line}")))?;
            let (key,val) = line.split_at(index);
            let key = key.trim().to_lowercase();
            let val = val[1..].trim().to_string();
            if key.is_empty() {
                return Err(syntax(line_no,String::from("empty key")));
            }
            let section = sections.last_mut().ok_or_else(|| syntax(line_no,String::from("key outside of any section")))?;
            if section.items.insert(key.clone(),val).is_some() {
                return Err(syntax(line_no,format!("duplicate key {key} in [{}]",section.name)));
            }
            last_key = Some(key);
        }
        Ok(Self { name:name.to_string(), sections })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn section(&self,name:&str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// sections whose name contains `pattern`, in file order
    pub fn sections_containing<'a>(&'a self,pattern:&'a str) -> impl Iterator<Item=&'a Section> + 'a {
        self.sections.iter().filter(move |s| s.name.contains(pattern))
    }

    pub fn reader<'a>(&'a self,section:&'a Section) -> SectionReader<'a> {
        SectionReader { case:&self.name, section, used:HashSet::new() }
    }
}

/// Typed access to a section's items. `finish` rejects items nobody asked for.
pub struct SectionReader<'a> {
    case:&'a str,
    section:&'a Section,
    used:HashSet<&'a str>,
}

impl<'a> SectionReader<'a> {

    fn field_error(&self,message:String) -> Error {
        Error::Field {
            case:self.case.to_string(),
            section:self.section.name.clone(),
            message,
        }
    }

    pub fn optional(&mut self,key:&'a str) -> Option<&'a str> {
        self.used.insert(key);
        self.section.items.get(key).map(|v| v.as_str())
    }

    pub fn required(&mut self,key:&'a str) -> Result<&'a str> {
        self.optional(key).ok_or_else(|| self.field_error(format!("missing required key {key}")))
    }

    pub fn parsed<T:FromStr>(&mut self,key:&'a str,default:T) -> Result<T> {
        match self.optional(key) {
            None => Ok(default),
            Some(v) => v.parse().map_err(|_| self.field_error(format!("cannot parse {key} = {v}"))),
        }
    }

    pub fn parsed_required<T:FromStr>(&mut self,key:&'a str) -> Result<T> {
        let v = self.required(key)?;
        v.parse().map_err(|_| self.field_error(format!("cannot parse {key} = {v}")))
    }

    pub fn boolean(&mut self,key:&'a str,default:bool) -> Result<bool> {
        match self.optional(key) {
            None => Ok(default),
            Some(v) => parse_bool(v).ok_or_else(|| self.field_error(format!("not a boolean: {key} = {v}"))),
        }
    }

    pub fn finish(self) -> Result<()> {
        let mut unknown:Vec<&str> = self.section.items.keys()
            .map(|k| k.as_str())
            .filter(|k| !self.used.contains(k))
            .collect();
        if unknown.is_empty() {
            return Ok(());
        }
        unknown.sort();
        Err(self.field_error(format!("unexpected keys {}",unknown.join(", "))))
    }
}

pub fn parse_bool(v:&str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Some(true),
        "0" | "no" | "false" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CASE:&str = "\
# comment
[dependency.client]
configuration=default_measurement_dependencies.xml

[reconstruction.test]
Reference_File = ref.mrd
output_images: out/img
; another comment
multi = first
   second
";

    #[test]
    fn sections_and_items() {
        let f = CaseFile::parse("x.cfg",CASE).unwrap();
        let dep = f.section("dependency.client").unwrap();
        assert_eq!(dep.items["configuration"],"default_measurement_dependencies.xml");
        let test = f.section("reconstruction.test").unwrap();
        assert_eq!(test.items["reference_file"],"ref.mrd");
        assert_eq!(test.items["output_images"],"out/img");
        assert_eq!(test.items["multi"],"first\nsecond");
        assert!(f.section("requirements").is_none());
    }

    #[test]
    fn syntax_errors() {
        assert!(matches!(CaseFile::parse("x","key=1"),Err(Error::Syntax { line:1, .. })));
        assert!(matches!(CaseFile::parse("x","[a]\nno delimiter"),Err(Error::Syntax { line:2, .. })));
        assert!(matches!(CaseFile::parse("x","[a\nk=v"),Err(Error::Syntax { .. })));
        assert!(matches!(CaseFile::parse("x","[a]\n[a]"),Err(Error::Syntax { line:2, .. })));
        assert!(matches!(CaseFile::parse("x","[a]\nk=1\nK=2"),Err(Error::Syntax { line:3, .. })));
    }

    #[test]
    fn reader_tracks_unknown_keys() {
        let f = CaseFile::parse("x.cfg","[requirements]\nsystem_memory=2048\ngpu_support=yes\nmystery=1\n").unwrap();
        let s = f.section("requirements").unwrap();
        let mut r = f.reader(s);
        assert_eq!(r.parsed("system_memory",0u64).unwrap(),2048);
        assert!(r.boolean("gpu_support",false).unwrap());
        assert!(!r.boolean("matlab_support",false).unwrap());
        assert!(matches!(r.finish(),Err(Error::Field { .. })));
    }

    #[test]
    fn booleans() {
        for t in ["1","yes","TRUE","On"] {
            assert_eq!(parse_bool(t),Some(true));
        }
        for f in ["0","no","False","off"] {
            assert_eq!(parse_bool(f),Some(false));
        }
        assert_eq!(parse_bool("maybe"),None);
    }
}
