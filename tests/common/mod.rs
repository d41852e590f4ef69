//! Shared test harness for integration tests.
//!
//! Real ffmpeg is not required: the harness writes small shell scripts into a
//! temp directory and hands them to [`SessionServer`] as the transcoder
//! binary, so tests control exactly what bytes a "transcode" produces and how
//! long it runs.

use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use castbridge::stream::SessionServer;
use tempfile::TempDir;

/// Temp-dir backed harness owning a [`SessionServer`] wired to a stub
/// transcoder script.
pub struct StreamHarness {
    pub dir: TempDir,
    pub server: SessionServer,
}

impl StreamHarness {
    /// Create a harness whose transcoder runs the given shell script body.
    /// The script receives the ffmpeg argument list but is free to ignore it.
    pub fn with_transcoder(script_body: &str) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let stub = write_script(dir.path(), "ffmpeg", script_body);
        let server = SessionServer::new(stub, Some(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        Self { dir, server }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

/// Write an executable `#!/bin/sh` script and return its path.
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("failed to create script");
    writeln!(file, "#!/bin/sh").expect("failed to write script");
    writeln!(file, "{body}").expect("failed to write script");
    drop(file);
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("failed to chmod script");
    path
}

/// Write a small solid-color image in the given format and return its path.
pub fn write_test_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([20, 120, 220]));
    image::DynamicImage::ImageRgb8(img)
        .save(&path)
        .expect("failed to write test image");
    path
}

/// True while a process with this pid is still alive.
pub fn pid_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
