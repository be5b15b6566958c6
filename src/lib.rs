// (C) Copyright 2020-2021 Hewlett Packard Enterprise Development LP

#![forbid(unsafe_code)]

#[macro_use] extern crate pest_derive;

mod error;
mod parser;
mod util;
mod image;
mod shell;
mod instructions;
mod dockerfile;
mod mappings;
mod tag;
mod packages;
mod convert;

pub use image::*;
pub use error::*;
pub use parser::*;
pub use shell::*;
pub use instructions::*;
pub use mappings::*;
pub use convert::*;
pub use packages::Manager;
pub use crate::dockerfile::*;
