//! Bootloader installation and boot-menu configuration.

pub mod esp;
pub mod grub_defaults;
pub mod installer;
pub mod windows;

pub use esp::{detect_esp, BootMode, ESP_CANDIDATES};
pub use installer::{BootReport, BootSettings, BootloaderInstaller};
pub use windows::{detect_windows, render_fragment, WindowsDetection};
