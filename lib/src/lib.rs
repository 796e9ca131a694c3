#![no_std]

#[cfg(test)]
extern crate std;

pub mod klog;
pub mod string;
pub mod sysinfo;

pub use klog::{KlogLevel, klog_dropped, klog_get_level, klog_register_backend, klog_set_level};
pub use string::{bytes_as_str, is_space, parse_usize};
pub use sysinfo::Sysinfo;
