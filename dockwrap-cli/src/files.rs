//! File installation helpers available to init plugins.

use anyhow::{anyhow, Context, Result};
use rhai::{Engine, EvalAltResult, INT};
use std::ffi::CString;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Copy `src` to `dst`, then set ownership and mode on `dst`
///
/// Missing parent directories of `dst` are created.
pub fn install_file(src: &Path, dst: &Path, owner: &str, group: &str, mode: u32) -> Result<()> {
    let uid = user_id(owner)?;
    let gid = group_id(group)?;

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    std::os::unix::fs::chown(dst, Some(uid), Some(gid))
        .with_context(|| format!("failed to chown {} to {}:{}", dst.display(), owner, group))?;
    fs::set_permissions(dst, fs::Permissions::from_mode(mode))
        .with_context(|| format!("failed to chmod {} to {:o}", dst.display(), mode))?;

    tracing::debug!(src = %src.display(), dst = %dst.display(), owner, group, mode = format!("{:o}", mode), "Installed file");
    Ok(())
}

/// [`install_file`] if `src` exists; returns whether it did
pub fn install_file_if_exists(
    src: &Path,
    dst: &Path,
    owner: &str,
    group: &str,
    mode: u32,
) -> Result<bool> {
    if !src.exists() {
        return Ok(false);
    }
    install_file(src, dst, owner, group, mode)?;
    Ok(true)
}

fn user_id(name: &str) -> Result<u32> {
    let c_name = CString::new(name).with_context(|| format!("invalid user name {:?}", name))?;
    // SAFETY: getpwnam returns null or a pointer to static storage, read
    // before any other passwd call.
    let pw = unsafe { libc::getpwnam(c_name.as_ptr()) };
    if pw.is_null() {
        return Err(anyhow!("unknown user {:?}", name));
    }
    Ok(unsafe { (*pw).pw_uid })
}

fn group_id(name: &str) -> Result<u32> {
    let c_name = CString::new(name).with_context(|| format!("invalid group name {:?}", name))?;
    // SAFETY: as for getpwnam.
    let gr = unsafe { libc::getgrnam(c_name.as_ptr()) };
    if gr.is_null() {
        return Err(anyhow!("unknown group {:?}", name));
    }
    Ok(unsafe { (*gr).gr_gid })
}

fn mode_bits(mode: INT) -> Result<u32, Box<EvalAltResult>> {
    u32::try_from(mode)
        .ok()
        .filter(|m| *m <= 0o7777)
        .ok_or_else(|| format!("invalid file mode {:o}", mode).into())
}

/// Register `install_file` and `install_file_if_exists` on `engine`
pub fn register(engine: &mut Engine) {
    engine
        .register_fn(
            "install_file",
            |src: &str, dst: &str, owner: &str, group: &str, mode: INT| -> Result<(), Box<EvalAltResult>> {
                install_file(Path::new(src), Path::new(dst), owner, group, mode_bits(mode)?)
                    .map_err(|e| format!("{:#}", e).into())
            },
        )
        .register_fn(
            "install_file_if_exists",
            |src: &str, dst: &str, owner: &str, group: &str, mode: INT| -> Result<bool, Box<EvalAltResult>> {
                install_file_if_exists(Path::new(src), Path::new(dst), owner, group, mode_bits(mode)?)
                    .map_err(|e| format!("{:#}", e).into())
            },
        );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use tempfile::TempDir;

    fn current_user_and_group() -> (String, String) {
        unsafe {
            let pw = libc::getpwuid(libc::getuid());
            let gr = libc::getgrgid(libc::getgid());
            assert!(!pw.is_null() && !gr.is_null());
            (
                CStr::from_ptr((*pw).pw_name).to_string_lossy().into_owned(),
                CStr::from_ptr((*gr).gr_name).to_string_lossy().into_owned(),
            )
        }
    }

    #[test]
    fn test_install_file() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("key");
        let dst = dir.path().join("ssh").join("id_rsa");
        fs::write(&src, "secret").unwrap();
        let (user, group) = current_user_and_group();

        install_file(&src, &dst, &user, &group, 0o600).unwrap();

        assert_eq!(fs::read_to_string(&dst).unwrap(), "secret");
        let mode = fs::metadata(&dst).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_install_file_if_exists_skips_missing() {
        let dir = TempDir::new().unwrap();
        let dst = dir.path().join("config");

        let installed =
            install_file_if_exists(&dir.path().join("missing"), &dst, "root", "root", 0o600).unwrap();

        assert!(!installed);
        assert!(!dst.exists());
    }

    #[test]
    fn test_unknown_user() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("f");
        fs::write(&src, "x").unwrap();

        let err = install_file(&src, &dir.path().join("g"), "no-such-user-dockwrap", "root", 0o600)
            .unwrap_err();
        assert!(err.to_string().contains("unknown user"));
    }

    #[test]
    fn test_from_script() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("cfg");
        fs::write(&src, "Host *").unwrap();
        let (user, group) = current_user_and_group();

        let mut engine = Engine::new();
        register(&mut engine);
        let script = format!(
            r#"install_file_if_exists("{}", "{}", "{}", "{}", 0o640)"#,
            src.display(),
            dir.path().join("out").display(),
            user,
            group
        );
        assert!(engine.eval::<bool>(&script).unwrap());

        let mode = fs::metadata(dir.path().join("out")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
        assert!(engine.eval::<bool>(r#"install_file_if_exists("/nonexistent/x", "/tmp/y", "root", "root", 99999)"#).is_err());
    }
}
