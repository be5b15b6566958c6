// (C) Copyright 2020 Hewlett Packard Enterprise Development LP

use pest;

#[derive(Parser)]
#[grammar = "shell.pest"]
pub(crate) struct ShellTokenizer;

pub(crate) type Pair<'a> = pest::iterators::Pair<'a, Rule>;
