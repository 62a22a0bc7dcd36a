use alloy::signers::local::PrivateKeySigner;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEFAULT_KEYSTORE_DIR: &str = "~/.foundry/keystores";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeystoreDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl KeystoreDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn resolve_keystore_dir(dir: Option<&str>) -> PathBuf {
    let raw = dir.unwrap_or(DEFAULT_KEYSTORE_DIR);
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Keystore files in `dir`, sorted by name. Foundry names them after the
/// account alias with no extension; `.json` files are accepted too.
pub fn list_keystores(dir: &Path) -> Result<Vec<KeystoreDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut keystores = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read keystore directory")? {
        let entry = entry.wrap_err("Failed to read keystore entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        match path.extension().and_then(|ext| ext.to_str()) {
            None | Some("json") => {}
            Some(_) => continue,
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid keystore filename {:?}", path))?
            .to_owned();
        if name.starts_with('.') {
            continue;
        }
        keystores.push(KeystoreDescriptor::new(name, path));
    }
    keystores.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(keystores)
}

pub fn find_keystore(dir: &Path, name: &str) -> Result<KeystoreDescriptor> {
    list_keystores(dir)?
        .into_iter()
        .find(|k| k.name == name)
        .ok_or_else(|| eyre!("Keystore '{name}' not found in {}", dir.to_string_lossy()))
}

pub fn unlock_keystore(descriptor: &KeystoreDescriptor) -> Result<PrivateKeySigner> {
    let prompt = format!("Enter password for keystore '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read keystore password")?;
    decrypt_keystore(descriptor, &password)
}

pub fn decrypt_keystore(
    descriptor: &KeystoreDescriptor,
    password: &str,
) -> Result<PrivateKeySigner> {
    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for keystore '{}'", descriptor.name))?;
    PrivateKeySigner::from_slice(&secret).map_err(|_| {
        eyre!(
            "Keystore '{}' contained unsupported key material",
            descriptor.name
        )
    })
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    fn scratch_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "coinflip-keystores-{label}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn list_keystores__missing_dir__is_empty() {
        let dir = std::env::temp_dir().join("coinflip-keystores-does-not-exist");

        assert!(list_keystores(&dir).unwrap().is_empty());
    }

    #[test]
    fn list_keystores__skips_foreign_and_hidden_files() {
        // given
        let dir = scratch_dir("list");
        fs::write(dir.join("player"), "{}").unwrap();
        fs::write(dir.join("backup.json"), "{}").unwrap();
        fs::write(dir.join("notes.txt"), "").unwrap();
        fs::write(dir.join(".DS_Store"), "").unwrap();
        fs::create_dir_all(dir.join("nested")).unwrap();

        // when
        let names: Vec<_> = list_keystores(&dir)
            .unwrap()
            .into_iter()
            .map(|k| k.name)
            .collect();

        // then
        assert_eq!(vec!["backup", "player"], names);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn find_keystore__unknown_name__errors() {
        let dir = scratch_dir("find");

        let err = find_keystore(&dir, "ghost").unwrap_err();

        assert!(err.to_string().contains("Keystore 'ghost' not found"));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn resolve_keystore_dir__explicit_path_is_kept() {
        assert_eq!(
            PathBuf::from("/tmp/keys"),
            resolve_keystore_dir(Some("/tmp/keys"))
        );
    }
}
