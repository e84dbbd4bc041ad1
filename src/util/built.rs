//! This file handles build-time information.

// Copyright (c) 2025 Piers Finlayson <piers@piers.rocks>
//
// GPLv3 licensed - see https://www.gnu.org/licenses/gpl-3.0.html

#[allow(unused_imports)]
use crate::fmt::{debug, error, info, trace, warn};

use crate::config::DriveConfig;

// Import the build-time information from the `built.rs` output file generated
// during the build process by `build.rs`.
#[allow(dead_code)]
mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Package version, used to build the DOS version banner.
pub const PKG_VERSION: &str = built_info::PKG_VERSION;

/// Log build-time information and the drive configuration to the console.
pub fn log_fw_info(bin_name: &str, config: &DriveConfig) {
    // General information
    info!("{} {} starting", built_info::PKG_NAME, bin_name);
    info!("Author: {}", built_info::PKG_AUTHORS);
    info!("Version: {}", built_info::PKG_VERSION);

    // Git information
    info!("Git commit: {}", built_info::GIT_COMMIT_HASH.unwrap_or("unknown"));
    info!("Git dirty: {}", built_info::GIT_DIRTY.unwrap_or(false));

    // Build information
    info!("Built: {}", built_info::BUILT_TIME_UTC);
    info!("Rust version: {}", built_info::RUSTC_VERSION);
    info!("Target triple: {}", built_info::TARGET);
    info!("Build profile: {}", built_info::PROFILE);
    info!("Enabled features: {}", built_info::FEATURES_LOWERCASE_STR);

    // Drive configuration
    info!(
        "Drive: device {}, model {:?}, JiffyDOS {}, VC20 mode {}, parallel {}",
        config.device_address,
        config.model,
        config.jiffy_enabled,
        config.vc20_mode,
        config.parallel_cable,
    );
}
