//! Phase C: structure normalization carried over from the original tool's
//! `structure_normalizer` module — username formatting, home-skeleton
//! population, and recursive ownership assignment. Ownership failures are
//! recorded and do not abort the user's run; the content has already landed
//! safely by the time this phase begins.

use std::path::Path;

use errors::{MigrationError, TARGET_001, TARGET_003, USER_002};

const INVALID_USERNAME_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Formats a Windows-era username (typically `user.domainsuffix`) into the
/// `{user}@{domain}` form used as the Linux account name, per the four-step
/// rule: reject empty, strip invalid characters (warning, not fatal), split
/// on the first `.` to resolve the domain through `domain_suffix_map`
/// (falling back to the raw suffix, or to `default` when there is no `.`),
/// then lowercase the result.
pub fn format_username_for_linux(
    username: &str,
    domain_suffix_map: &std::collections::BTreeMap<String, String>,
) -> Result<String, MigrationError> {
    if username.is_empty() {
        return Err(MigrationError::new(USER_002, "username is empty"));
    }

    let has_invalid = username.contains(|c: char| INVALID_USERNAME_CHARS.contains(&c) || c == ' ');
    let cleaned: String = username.chars().filter(|c| !INVALID_USERNAME_CHARS.contains(c) && *c != ' ').collect();
    if has_invalid {
        tracing::warn!(username, cleaned = %cleaned, "username contained characters invalid on Linux; continuing with cleaned name");
    }

    let (user, domain) = if let Some((user, suffix)) = cleaned.split_once('.') {
        let domain = domain_suffix_map.get(suffix).cloned().unwrap_or_else(|| suffix.to_string());
        (user.to_string(), domain)
    } else {
        let domain = domain_suffix_map.get("default").cloned().unwrap_or_else(|| "default".to_string());
        (cleaned.clone(), domain)
    };

    Ok(format!("{user}@{domain}").to_lowercase())
}

/// Populates `home_dir` from `skel_dir` when the home directory does not yet
/// exist; a no-op otherwise, matching the original tool's idempotent check.
pub fn copy_skel(skel_dir: &Path, home_dir: &Path) -> Result<(), MigrationError> {
    if home_dir.exists() {
        return Ok(());
    }
    if !skel_dir.exists() {
        return Err(MigrationError::new(
            TARGET_001,
            format!("skeleton directory not found: {}", skel_dir.display()),
        ));
    }
    if let Some(parent) = home_dir.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            MigrationError::new(TARGET_001, format!("failed to create parent of {}", home_dir.display())).with_cause(&e)
        })?;
    }
    copy_tree(skel_dir, home_dir)
}

fn copy_tree(src: &Path, dst: &Path) -> Result<(), MigrationError> {
    std::fs::create_dir_all(dst).map_err(|e| {
        MigrationError::new(TARGET_001, format!("failed to create {}", dst.display())).with_cause(&e)
    })?;
    let read_dir = std::fs::read_dir(src).map_err(|e| {
        MigrationError::new(TARGET_001, format!("failed to read {}", src.display())).with_cause(&e)
    })?;
    for entry in read_dir {
        let entry = entry
            .map_err(|e| MigrationError::new(TARGET_001, format!("failed to read entry under {}", src.display())).with_cause(&e))?;
        let file_type = entry
            .file_type()
            .map_err(|e| MigrationError::new(TARGET_001, "failed to stat skeleton entry").with_cause(&e))?;
        let child_dst = dst.join(entry.file_name());
        if file_type.is_dir() {
            copy_tree(&entry.path(), &child_dst)?;
        } else {
            fast_io::copy_file(&entry.path(), &child_dst)?;
        }
    }
    Ok(())
}

/// Recursively `chown`s `home_dir` to `user`'s UID and `group`'s GID. Failures
/// are returned as a typed `TARGET_003` error; the caller records it without
/// aborting the user's run.
#[cfg(unix)]
pub fn chown_recursive(home_dir: &Path, user: &str, group: &str) -> Result<(), MigrationError> {
    use nix::unistd::{Group, User};

    let uid = User::from_name(user)
        .map_err(|e| MigrationError::new(TARGET_003, format!("failed to look up user {user}")).with_cause(&std::io::Error::from_raw_os_error(e as i32)))?
        .ok_or_else(|| MigrationError::new(TARGET_003, format!("local user not found: {user}")))?
        .uid;
    let gid = Group::from_name(group)
        .map_err(|e| MigrationError::new(TARGET_003, format!("failed to look up group {group}")).with_cause(&std::io::Error::from_raw_os_error(e as i32)))?
        .ok_or_else(|| MigrationError::new(TARGET_003, format!("local group not found: {group}")))?
        .gid;

    chown_tree(home_dir, uid, gid)
}

#[cfg(unix)]
fn chown_tree(path: &Path, uid: nix::unistd::Uid, gid: nix::unistd::Gid) -> Result<(), MigrationError> {
    use nix::unistd;

    unistd::chown(path, Some(uid), Some(gid)).map_err(|e| {
        MigrationError::new(TARGET_003, format!("chown failed for {}", path.display()))
            .with_cause(&std::io::Error::from_raw_os_error(e as i32))
    })?;

    if path.is_dir() {
        let read_dir = std::fs::read_dir(path).map_err(|e| {
            MigrationError::new(TARGET_003, format!("failed to read {}", path.display())).with_cause(&e)
        })?;
        for entry in read_dir {
            let entry = entry
                .map_err(|e| MigrationError::new(TARGET_003, "failed to read directory entry").with_cause(&e))?;
            chown_tree(&entry.path(), uid, gid)?;
        }
    }
    Ok(())
}
