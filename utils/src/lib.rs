use std::path::{Component, Path, PathBuf};
use std::fs::File;
use std::io::{Read, Write};
use glob::glob;
use path_clean::PathClean;
use tracing::debug;

pub type Result<T> = std::result::Result<T,Error>;

#[derive(Debug,thiserror::Error)]
pub enum Error {
    #[error("cannot access {path:?}: {source}")]
    Io {
        path:PathBuf,
        #[source]
        source:std::io::Error,
    },
    #[error("bad file pattern {pattern}: {source}")]
    Pattern {
        pattern:String,
        #[source]
        source:glob::PatternError,
    },
    #[error("{path:?}: md5 mismatch, expected {expected} got {actual}")]
    DigestMismatch {
        path:PathBuf,
        expected:String,
        actual:String,
    },
}

impl Error {
    pub fn io(path:&Path,source:std::io::Error) -> Self {
        Error::Io { path:path.to_owned(), source }
    }
}

/// read a text file after forcing its extension
pub fn read_to_string(filepath:&Path,extension:&str) -> Result<String> {
    read_file_to_string(&filepath.with_extension(extension))
}

pub fn read_file_to_string(filepath:&Path) -> Result<String> {
    let mut f = File::open(filepath).map_err(|e| Error::io(filepath,e))?;
    let mut s = String::new();
    f.read_to_string(&mut s).map_err(|e| Error::io(filepath,e))?;
    Ok(s)
}

/// write a text file after forcing its extension
pub fn write_to_file(filepath:&Path,extension:&str,string:&str) -> Result<()> {
    let p = filepath.with_extension(extension);
    write_file(&p,string.as_bytes())
}

/// create (or truncate) a file and write all bytes. The file is synced and closed on return.
pub fn write_file(filepath:&Path,bytes:&[u8]) -> Result<()> {
    let mut f = File::create(filepath).map_err(|e| Error::io(filepath,e))?;
    f.write_all(bytes).map_err(|e| Error::io(filepath,e))?;
    f.sync_all().map_err(|e| Error::io(filepath,e))?;
    Ok(())
}

pub fn md5_hex(bytes:&[u8]) -> String {
    format!("{:x}",md5::compute(bytes))
}

/// md5 hex digest of a file as it currently exists on disk
pub fn file_md5(filepath:&Path) -> Result<String> {
    let mut f = File::open(filepath).map_err(|e| Error::io(filepath,e))?;
    let mut bytes = Vec::<u8>::new();
    f.read_to_end(&mut bytes).map_err(|e| Error::io(filepath,e))?;
    Ok(md5_hex(&bytes))
}

/// write a file, then digest what landed on disk
pub fn write_with_digest(filepath:&Path,bytes:&[u8]) -> Result<String> {
    write_file(filepath,bytes)?;
    let digest = file_md5(filepath)?;
    debug!("{}: md5 {}",filepath.display(),digest);
    Ok(digest)
}

pub fn validate_md5(filepath:&Path,expected:&str) -> Result<()> {
    let actual = file_md5(filepath)?;
    if actual != expected {
        return Err(Error::DigestMismatch {
            path:filepath.to_owned(),
            expected:expected.to_string(),
            actual,
        });
    }
    debug!("{}: md5 match",filepath.display());
    Ok(())
}

/// lexically normalize a path ("a/./b/../c" -> "a/c")
pub fn normalize(path:&Path) -> PathBuf {
    path.clean()
}

fn absolute(path:&Path) -> Result<PathBuf> {
    match path.is_absolute() {
        true => Ok(normalize(path)),
        false => {
            let cwd = std::env::current_dir().map_err(|e| Error::io(path,e))?;
            Ok(normalize(&cwd.join(path)))
        }
    }
}

/// path of `path` relative to `base`, walking up with ".." where needed
pub fn relative_path(path:&Path,base:&Path) -> Result<PathBuf> {
    let path = absolute(path)?;
    let base = absolute(base)?;
    let common = path.components().zip(base.components()).take_while(|(a,b)| a == b).count();
    let mut rel = PathBuf::new();
    base.components().skip(common).for_each(|_| rel.push(Component::ParentDir));
    path.components().skip(common).for_each(|c| rel.push(c));
    if rel.as_os_str().is_empty() {
        rel.push(Component::CurDir);
    }
    Ok(rel)
}

// single depth search, sorted
pub fn get_all_matches(dir:&Path,pattern:&str) -> Result<Vec<PathBuf>> {
    let pat = dir.join(pattern);
    let pat = pat.to_string_lossy().into_owned();
    let mut matches:Vec<PathBuf> = glob(&pat)
        .map_err(|source| Error::Pattern { pattern:pat.clone(), source })?
        .flat_map(|m| m)
        .collect();
    matches.sort();
    Ok(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_of_known_string() {
        assert_eq!(md5_hex(b"hello world"),"5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(md5_hex(b""),"d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn relative_paths() {
        let rel = relative_path(Path::new("/data/gadgetron/epi_2d/./case.yml"),Path::new("/data/gadgetron")).unwrap();
        assert_eq!(rel,PathBuf::from("epi_2d/case.yml"));

        let rel = relative_path(Path::new("/data/other/x.yml"),Path::new("/data/gadgetron/")).unwrap();
        assert_eq!(rel,PathBuf::from("../other/x.yml"));

        let rel = relative_path(Path::new("/data"),Path::new("/data")).unwrap();
        assert_eq!(rel,PathBuf::from("."));
    }

    #[test]
    fn digest_matches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("a.txt");
        let d = write_with_digest(&p,b"abc").unwrap();
        assert_eq!(d,md5_hex(b"abc"));
        validate_md5(&p,&d).unwrap();
        write_file(&p,b"abd").unwrap();
        assert!(matches!(validate_md5(&p,&d),Err(Error::DigestMismatch{..})));
    }

    #[test]
    fn extension_is_forced() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("settings");
        write_to_file(&p,"toml","x = 1").unwrap();
        assert!(dir.path().join("settings.toml").exists());
        assert_eq!(read_to_string(&p,"toml").unwrap(),"x = 1");
    }

    #[test]
    fn sorted_matches() {
        let dir = tempfile::tempdir().unwrap();
        for n in ["b.cfg","a.cfg","c.txt"] {
            write_file(&dir.path().join(n),b"").unwrap();
        }
        let m = get_all_matches(dir.path(),"*.cfg").unwrap();
        let names:Vec<_> = m.iter().map(|p| p.file_name().unwrap().to_str().unwrap().to_string()).collect();
        assert_eq!(names,vec!["a.cfg","b.cfg"]);
    }
}
