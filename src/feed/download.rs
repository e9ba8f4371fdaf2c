use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::error::RelaunchError;

/// Sibling of `dest` that receives bytes while a transfer is in flight.
pub fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("download"));
    name.push(".part");
    dest.with_file_name(name)
}

/// Stream `url` into `dest`, returning the number of bytes written.
///
/// Bytes go to `<dest>.part` first and are renamed onto `dest` only once the
/// body has been read to the end, so `dest` is either the previous file or the
/// complete new one. A non-success status never touches the filesystem.
pub fn download(client: &Client, url: &str, dest: &Path) -> Result<u64, RelaunchError> {
    let mut response = client.get(url).send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(RelaunchError::Network(format!(
            "download returned {} for {}",
            status, url
        )));
    }

    let pb = progress_bar(response.content_length());
    write_atomically(&mut response, dest, &pb)
}

/// Copy `body` into `<dest>.part`, then rename it onto `dest`. On any error
/// the part file is removed and `dest` is left as it was.
fn write_atomically(
    body: &mut impl Read,
    dest: &Path,
    pb: &ProgressBar,
) -> Result<u64, RelaunchError> {
    let part = part_path(dest);

    let written = match stream_to_file(body, &part, pb) {
        Ok(n) => n,
        Err(e) => {
            pb.abandon();
            let _ = fs::remove_file(&part);
            return Err(e);
        }
    };
    pb.finish_and_clear();

    if let Err(e) = fs::rename(&part, dest) {
        let _ = fs::remove_file(&part);
        return Err(RelaunchError::fs("move download onto", dest, e));
    }

    Ok(written)
}

fn stream_to_file(
    response: &mut impl Read,
    path: &Path,
    pb: &ProgressBar,
) -> Result<u64, RelaunchError> {
    let mut file = File::create(path).map_err(|e| RelaunchError::fs("create", path, e))?;
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| RelaunchError::Network(format!("transfer interrupted: {}", e)))?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])
            .map_err(|e| RelaunchError::fs("write", path, e))?;
        downloaded += bytes_read as u64;
        pb.set_position(downloaded);
    }

    file.sync_all()
        .map_err(|e| RelaunchError::fs("sync", path, e))?;
    Ok(downloaded)
}

fn progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(len) => {
            let pb = ProgressBar::new(len);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {bytes}") {
                pb.set_style(style);
            }
            pb
        }
    }
}
