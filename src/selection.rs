// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// The kind of source rendered on each trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Pass the input through untouched.
    #[default]
    Bypass,
    Silence,
    Beep,
    Noise,
    /// The most recently loaded file.
    Sample,
}

impl SourceKind {
    /// The built-in kinds, in menu order.
    pub const BUILTIN: [SourceKind; 4] = [
        SourceKind::Bypass,
        SourceKind::Silence,
        SourceKind::Beep,
        SourceKind::Noise,
    ];

    pub fn label(self) -> &'static str {
        match self {
            SourceKind::Bypass => "none",
            SourceKind::Silence => "silence",
            SourceKind::Beep => "beep",
            SourceKind::Noise => "noise",
            SourceKind::Sample => "sample",
        }
    }

    /// Parses a built-in label. `sample` is not accepted: a sample needs a file.
    pub fn from_label(label: &str) -> Option<SourceKind> {
        SourceKind::BUILTIN
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(label))
    }

    /// Procedural kinds need no buffer.
    pub fn is_procedural(self) -> bool {
        matches!(
            self,
            SourceKind::Silence | SourceKind::Beep | SourceKind::Noise
        )
    }
}

impl From<SourceKind> for u8 {
    fn from(kind: SourceKind) -> u8 {
        match kind {
            SourceKind::Bypass => 0,
            SourceKind::Silence => 1,
            SourceKind::Beep => 2,
            SourceKind::Noise => 3,
            SourceKind::Sample => 4,
        }
    }
}

impl From<u8> for SourceKind {
    /// Unknown values fall back to bypass.
    fn from(value: u8) -> SourceKind {
        match value {
            1 => SourceKind::Silence,
            2 => SourceKind::Beep,
            3 => SourceKind::Noise,
            4 => SourceKind::Sample,
            _ => SourceKind::Bypass,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A file that was loaded before and can be picked again from the menu.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedFile {
    pub name: String,
    pub path: PathBuf,
}

impl LoadedFile {
    /// Uses the file name as the display name.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            name,
            path: path.to_path_buf(),
        }
    }
}

/// One entry of the selection menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuEntry<'a> {
    Source(SourceKind),
    File(&'a LoadedFile),
    /// Open a file chooser.
    LoadNew,
}

/// The menu shown to the user: the built-in kinds, then previously loaded
/// files, then the "load a new file" action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionMenu {
    files: Vec<LoadedFile>,
}

impl SelectionMenu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(files: Vec<LoadedFile>) -> Self {
        let mut menu = Self::new();
        for file in files {
            menu.add_file(file);
        }
        menu
    }

    pub fn len(&self) -> usize {
        SourceKind::BUILTIN.len() + self.files.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn files(&self) -> &[LoadedFile] {
        &self.files
    }

    pub fn entry(&self, index: usize) -> Option<MenuEntry<'_>> {
        let builtin = SourceKind::BUILTIN.len();
        if index < builtin {
            return Some(MenuEntry::Source(SourceKind::BUILTIN[index]));
        }
        let index = index - builtin;
        if index < self.files.len() {
            return Some(MenuEntry::File(&self.files[index]));
        }
        (index == self.files.len()).then_some(MenuEntry::LoadNew)
    }

    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = SourceKind::BUILTIN
            .iter()
            .map(|kind| kind.label().to_string())
            .collect();
        labels.extend(self.files.iter().map(|file| file.name.clone()));
        labels.push("load...".to_string());
        labels
    }

    /// Adds a file (or finds the existing entry for its path) and returns its
    /// menu index.
    pub fn add_file(&mut self, file: LoadedFile) -> usize {
        match self.files.iter().position(|f| f.path == file.path) {
            Some(position) => {
                self.files[position].name = file.name;
                SourceKind::BUILTIN.len() + position
            }
            None => {
                self.files.push(file);
                SourceKind::BUILTIN.len() + self.files.len() - 1
            }
        }
    }

    pub fn index_of_path(&self, path: &Path) -> Option<usize> {
        self.files
            .iter()
            .position(|f| f.path == path)
            .map(|position| SourceKind::BUILTIN.len() + position)
    }

    pub fn index_of_kind(&self, kind: SourceKind) -> Option<usize> {
        SourceKind::BUILTIN.iter().position(|k| *k == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> LoadedFile {
        LoadedFile {
            name: name.to_string(),
            path: PathBuf::from(format!("/samples/{}", name)),
        }
    }

    #[test]
    fn test_menu_order() {
        let menu = SelectionMenu::with_files(vec![file("a.wav"), file("b.wav")]);

        assert_eq!(menu.len(), 7);
        assert_eq!(menu.entry(0), Some(MenuEntry::Source(SourceKind::Bypass)));
        assert_eq!(menu.entry(2), Some(MenuEntry::Source(SourceKind::Beep)));
        assert_eq!(menu.entry(3), Some(MenuEntry::Source(SourceKind::Noise)));
        assert!(matches!(menu.entry(4), Some(MenuEntry::File(f)) if f.name == "a.wav"));
        assert!(matches!(menu.entry(5), Some(MenuEntry::File(f)) if f.name == "b.wav"));
        assert_eq!(menu.entry(6), Some(MenuEntry::LoadNew));
        assert_eq!(menu.entry(7), None);

        assert_eq!(
            menu.labels(),
            vec!["none", "silence", "beep", "noise", "a.wav", "b.wav", "load..."]
        );
    }

    #[test]
    fn test_add_file_deduplicates_by_path() {
        let mut menu = SelectionMenu::new();
        assert_eq!(menu.entry(4), Some(MenuEntry::LoadNew));

        assert_eq!(menu.add_file(file("a.wav")), 4);
        assert_eq!(menu.add_file(file("b.wav")), 5);
        assert_eq!(menu.add_file(file("a.wav")), 4);
        assert_eq!(menu.files().len(), 2);
        assert_eq!(menu.index_of_path(Path::new("/samples/b.wav")), Some(5));
        assert_eq!(menu.index_of_path(Path::new("/samples/c.wav")), None);
    }

    #[test]
    fn test_kind_conversions() {
        for kind in SourceKind::BUILTIN {
            assert_eq!(SourceKind::from(u8::from(kind)), kind);
            assert_eq!(SourceKind::from_label(kind.label()), Some(kind));
        }
        assert_eq!(SourceKind::from(u8::from(SourceKind::Sample)), SourceKind::Sample);
        assert_eq!(SourceKind::from(200), SourceKind::Bypass);
        assert_eq!(SourceKind::from_label("NOISE"), Some(SourceKind::Noise));
        assert_eq!(SourceKind::from_label("sample"), None);
        assert!(SourceKind::Beep.is_procedural());
        assert!(!SourceKind::Sample.is_procedural());
    }

    #[test]
    fn test_loaded_file_name() {
        let file = LoadedFile::from_path(Path::new("/tmp/kick.flac"));
        assert_eq!(file.name, "kick.flac");
    }
}
