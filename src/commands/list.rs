//! List command implementation

use bttag_writer::available_tags;

/// List all tag backends compiled in
pub fn list_tags() {
    let tags = available_tags();
    if tags.is_empty() {
        println!("No tag backends available (recompile with features)");
        return;
    }

    println!("Supported tag backends:");
    println!();
    for tag in &tags {
        println!("  {:<20} - {}", tag.name, tag.description);
        if !tag.aliases.is_empty() {
            println!("  {:<20}   aliases: {}", "", tag.aliases.join(", "));
        }
    }
}
