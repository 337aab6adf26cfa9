//! Logging and debugging facilities for Horizon Presentation.
//!
//! This module provides:
//! - The `tracing` targets every event in the crate is emitted under
//! - Debug visualization of dependency object trees with their property
//!   values and value sources
//!
//! # Tracing Integration
//!
//! Install any `tracing` subscriber to see events. Filtering by target
//! isolates one subsystem:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("horizon_presentation::binding=debug")
//!     .init();
//! ```
//!
//! # Debug Visualization
//!
//! ```ignore
//! use horizon_presentation::logging::DependencyTreeDebug;
//!
//! println!("{}", DependencyTreeDebug::new().format_subtree(&window));
//! ```

use std::fmt::{self, Write as FmtWrite};

use crate::foundation::PresentationFoundation;
use crate::object::DependencyObject;

/// Target names for filtering tracing output.
pub mod targets {
    /// Object creation and the element tree.
    pub const CORE: &str = "horizon_presentation";
    /// Property registration, value materialization and change notifications.
    pub const PROPERTY: &str = "horizon_presentation::property";
    /// Binding resolution, accessor compilation and data sources.
    pub const BINDING: &str = "horizon_presentation::binding";
    /// Digest cycles.
    pub const DIGEST: &str = "horizon_presentation::digest";
    /// Clocks and animations.
    pub const ANIMATION: &str = "horizon_presentation::animation";
}

/// Style options for tree visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeStyle {
    /// ASCII characters for tree branches.
    Ascii,
    /// Unicode box-drawing characters.
    #[default]
    Unicode,
    /// Compact single-line representation.
    Compact,
}

/// Configuration for tree debug output.
#[derive(Debug, Clone)]
pub struct TreeFormatOptions {
    /// The style of tree visualization.
    pub style: TreeStyle,
    /// Whether to show element ids.
    pub show_ids: bool,
    /// Whether to list materialized property values.
    pub show_values: bool,
    /// Whether to annotate values with their source.
    pub show_sources: bool,
    /// Maximum depth to traverse (None for unlimited).
    pub max_depth: Option<usize>,
    /// Indent size for each level.
    pub indent_size: usize,
}

impl Default for TreeFormatOptions {
    fn default() -> Self {
        Self {
            style: TreeStyle::default(),
            show_ids: true,
            show_values: true,
            show_sources: true,
            max_depth: None,
            indent_size: 2,
        }
    }
}

impl TreeFormatOptions {
    /// Object names and types only.
    pub fn minimal() -> Self {
        Self {
            show_ids: false,
            show_values: false,
            show_sources: false,
            ..Default::default()
        }
    }
}

/// Renders a dependency object subtree for debugging.
#[derive(Debug, Clone, Default)]
pub struct DependencyTreeDebug {
    options: TreeFormatOptions,
}

impl DependencyTreeDebug {
    /// A visualizer with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// A visualizer with custom options.
    pub fn with_options(options: TreeFormatOptions) -> Self {
        Self { options }
    }

    /// Format the subtree rooted at `root`.
    pub fn format_subtree(&self, root: &DependencyObject) -> String {
        let mut output = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_subtree(root, 0, true, &mut output);
        output
    }

    fn write_subtree(
        &self,
        object: &DependencyObject,
        depth: usize,
        is_last: bool,
        output: &mut String,
    ) -> fmt::Result {
        if self.options.max_depth.is_some_and(|max| depth > max) {
            return Ok(());
        }

        output.push_str(&self.build_prefix(depth, is_last));
        let name = object.name();
        output.push_str(if name.is_empty() { "(unnamed)" } else { &name });
        if self.options.show_ids {
            write!(output, " [{:?}]", object.element_id())?;
        }
        let type_name = object.owner_type().name();
        write!(output, " ({})", type_name.rsplit("::").next().unwrap_or(type_name))?;
        output.push('\n');

        if self.options.show_values {
            let prefix = self.build_property_prefix(depth);
            for property in object.properties() {
                let value = object.debug_value(property).unwrap_or_default();
                write!(output, "{prefix}  .{property} = {value}")?;
                if self.options.show_sources {
                    if let Ok(source) = object.value_source(property) {
                        write!(output, " ({source})")?;
                    }
                }
                output.push('\n');
            }
        }

        let mut children = Vec::new();
        PresentationFoundation::tree_walker().for_each_child(object, &mut |child| children.push(child.clone()));
        let count = children.len();
        for (index, child) in children.iter().enumerate() {
            self.write_subtree(child, depth + 1, index + 1 == count, output)?;
        }
        Ok(())
    }

    fn build_prefix(&self, depth: usize, is_last: bool) -> String {
        if depth == 0 {
            return String::new();
        }

        let (branch, tee, corner) = match self.options.style {
            TreeStyle::Ascii => ("|", "+--", "`--"),
            TreeStyle::Unicode => ("\u{2502}", "\u{251c}\u{2500}\u{2500}", "\u{2514}\u{2500}\u{2500}"),
            TreeStyle::Compact => ("", "-", "-"),
        };

        let mut prefix = String::new();
        for _ in 0..depth - 1 {
            prefix.push_str(branch);
            prefix.push_str(&" ".repeat(self.options.indent_size));
        }
        prefix.push_str(if is_last { corner } else { tee });
        prefix.push(' ');
        prefix
    }

    fn build_property_prefix(&self, depth: usize) -> String {
        let branch = match self.options.style {
            TreeStyle::Ascii => "|",
            TreeStyle::Unicode => "\u{2502}",
            TreeStyle::Compact => "",
        };
        let mut prefix = String::new();
        for _ in 0..depth {
            prefix.push_str(branch);
            prefix.push_str(&" ".repeat(self.options.indent_size));
        }
        prefix
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use super::*;
    use crate::dependency_property::{DependencyProperty, PropertyMetadata};

    struct Window;
    struct Label;

    static TITLE: LazyLock<DependencyProperty> = LazyLock::new(|| {
        DependencyProperty::register::<String, Window>("Title", PropertyMetadata::new(String::new())).unwrap()
    });

    #[test]
    fn test_tree_format_hierarchy() {
        let window = DependencyObject::new::<Window>();
        window.set_name("window");
        window.set_value(*TITLE, "Main".to_string()).unwrap();
        let first = DependencyObject::new::<Label>();
        first.set_name("first");
        let second = DependencyObject::new::<Label>();
        second.set_name("second");
        first.set_parent(Some(&window)).unwrap();
        second.set_parent(Some(&window)).unwrap();

        let output = DependencyTreeDebug::new().format_subtree(&window);
        assert!(output.contains("window"));
        assert!(output.contains("(Window)"));
        assert!(output.contains(".Title = \"Main\" (local)"));
        assert!(output.contains("\u{251c}\u{2500}\u{2500} first"));
        assert!(output.contains("\u{2514}\u{2500}\u{2500} second"));
    }

    #[test]
    fn test_tree_format_minimal() {
        let window = DependencyObject::new::<Window>();
        window.set_name("test");
        window.set_value(*TITLE, "Hidden".to_string()).unwrap();

        let output = DependencyTreeDebug::with_options(TreeFormatOptions::minimal()).format_subtree(&window);
        assert!(output.contains("test"));
        assert!(!output.contains("Hidden"));
        assert!(!output.contains('['));
    }
}
