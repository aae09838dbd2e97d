mod common;
mod tree;
