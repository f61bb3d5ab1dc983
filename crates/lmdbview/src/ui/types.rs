//! Types and enums used across the UI

use super::input::TextInput;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Browser,
    Help,
    ValueEditor,
    NewRow,
    ConnectionForm,
    ConfirmDeleteRow,
    ConfirmDeleteConnection,
}

/// Which panel of the browser receives navigation keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Connections,
    Table,
}

/// One-line input shown in place of the status bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Prefix,
    Page,
}

impl Prompt {
    pub fn label(&self) -> &'static str {
        match self {
            Prompt::Prefix => "Prefix: ",
            Prompt::Page => "Go to page: ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFormMode {
    New,
    Edit(usize),
}

pub struct ValueEditor {
    /// Stored key, which may not be UTF-8.
    pub key: Vec<u8>,
    pub value: TextInput,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub label: &'static str,
    pub input: TextInput,
}

/// Stack of labelled inputs with one focused field.
#[derive(Debug, Clone)]
pub struct Form {
    pub fields: Vec<Field>,
    pub focus: usize,
}

impl Form {
    pub fn new(fields: &[(&'static str, &str)]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|&(label, value)| Field {
                    label,
                    input: TextInput::new(value),
                })
                .collect(),
            focus: 0,
        }
    }

    pub fn value(&self, index: usize) -> &str {
        self.fields
            .get(index)
            .map(|f| f.input.text())
            .unwrap_or_default()
    }

    pub fn focused_mut(&mut self) -> Option<&mut TextInput> {
        self.fields.get_mut(self.focus).map(|f| &mut f.input)
    }

    pub fn next(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + 1) % self.fields.len();
        }
    }

    pub fn previous(&mut self) {
        if !self.fields.is_empty() {
            self.focus = (self.focus + self.fields.len() - 1) % self.fields.len();
        }
    }

    pub fn is_last(&self) -> bool {
        self.focus + 1 >= self.fields.len()
    }
}
