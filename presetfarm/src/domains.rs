// narrow interfaces the tree editor and the presentation layer provide
pub mod progress_sink;
pub mod tree_source;
