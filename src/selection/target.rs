//! Supported targets and the reply encoder.
//!
//! Every text target is answered with the same bytes: no transcoding
//! happens between `UTF8_STRING`, `STRING`, `TEXT`, `COMPOUND_TEXT` and
//! `text/plain;charset=utf-8`. `TARGETS` is the only meta target.

use x11rb::protocol::xproto::Atom;

use super::Payload;
use crate::content::Content;

/// A content type this process answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Targets,
    Utf8String,
    String,
    Text,
    CompoundText,
    TextPlainUtf8,
}

impl Target {
    /// Every supported target, in the order advertised to requestors.
    pub const ALL: [Target; 6] = [
        Target::Targets,
        Target::Utf8String,
        Target::String,
        Target::Text,
        Target::CompoundText,
        Target::TextPlainUtf8,
    ];

    /// Atom name used when interning.
    pub fn name(self) -> &'static str {
        match self {
            Target::Targets => "TARGETS",
            Target::Utf8String => "UTF8_STRING",
            Target::String => "STRING",
            Target::Text => "TEXT",
            Target::CompoundText => "COMPOUND_TEXT",
            Target::TextPlainUtf8 => "text/plain;charset=utf-8",
        }
    }

    /// `true` for targets answered with the content bytes.
    pub fn delivers_content(self) -> bool {
        self != Target::Targets
    }
}

/// Supported targets bound to their interned atoms.
///
/// Built once at startup and never changed.
#[derive(Debug, Clone)]
pub struct TargetSet {
    atoms: [Atom; 6],
}

impl TargetSet {
    /// Bind every target in [`Target::ALL`] to an atom.
    pub fn resolve<E>(mut intern: impl FnMut(Target) -> Result<Atom, E>) -> Result<Self, E> {
        let mut atoms = [0; 6];
        for (slot, target) in atoms.iter_mut().zip(Target::ALL) {
            *slot = intern(target)?;
        }
        Ok(Self { atoms })
    }

    /// Which supported target, if any, `atom` names.
    pub fn lookup(&self, atom: Atom) -> Option<Target> {
        self.atoms
            .iter()
            .position(|&a| a == atom)
            .map(|i| Target::ALL[i])
    }

    /// Atoms listed in a `TARGETS` reply, the meta target included.
    pub fn advertised(&self) -> &[Atom] {
        &self.atoms
    }

    /// Build the property payload answering a request for `requested`.
    ///
    /// Returns `None` for unsupported targets; the caller then refuses
    /// the request.
    pub fn encode<'a>(&'a self, requested: Atom, content: &'a Content) -> Option<Payload<'a>> {
        let target = self.lookup(requested)?;
        if target.delivers_content() {
            Some(Payload::Text {
                type_: requested,
                data: content.as_bytes(),
            })
        } else {
            Some(Payload::Atoms(self.advertised()))
        }
    }
}
