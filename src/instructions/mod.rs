// (C) Copyright 2020 Hewlett Packard Enterprise Development LP

mod from;
pub use from::*;

mod arg;
pub use arg::*;

mod run;
pub use run::*;
