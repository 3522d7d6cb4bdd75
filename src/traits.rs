pub trait HasName {
    fn name(&self) -> &str;
}

pub trait HasState {
    fn state(&self) -> Option<&str>;
}

/// Text rendering of a component without its bond labels.
///
/// The label doubles as the vertex colour during canonical labeling, so two
/// components get the same colour exactly when they render identically.
pub trait WriteLabel: HasName {
    fn write_label(&self, out: &mut String);

    /// Bond wildcards written after the explicit bond labels (`!+`, `!?`).
    fn write_wildcard(&self, _out: &mut String) {}
}
