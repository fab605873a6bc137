pub mod template_writer;

pub use template_writer::{SaveTemplateRequest, TemplateTree, TemplateWriter, TreeCounts};
