pub mod allowables;
pub mod dictionary;
pub mod graphemeparse;
pub mod normalize;
pub mod output;

pub use allowables::read_allowables;
pub use dictionary::read_dictionary;
pub use output::{write_alignments, write_table};
