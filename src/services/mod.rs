pub mod candidates;
pub mod catalog;
pub mod evidence;
pub mod oracle;
pub mod recommendation;
