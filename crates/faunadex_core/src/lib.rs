pub mod archive;
pub mod config;
pub mod dedup;
pub mod extract;
pub mod fish;
pub mod html;
pub mod index;
pub mod pages;
pub mod parsers;
pub mod runtime;
pub mod species;
#[cfg(feature = "zim")]
pub mod zim_archive;
