use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

use crate::controller::NewBird;
use crate::models::{Bird, Species};

/// Internal representation of the bird form fields.
#[derive(Clone)]
pub(crate) struct BirdForm {
    pub(crate) name: String,
    pub(crate) info: String,
    pub(crate) species: Species,
    pub(crate) active: BirdField,
    pub(crate) error: Option<String>,
}

/// Fields available within the bird form. Species is picked, not typed.
#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub(crate) enum BirdField {
    #[default]
    Name,
    Info,
    Species,
}

impl Default for BirdForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            info: String::new(),
            species: Species::Cardinal,
            active: BirdField::Name,
            error: None,
        }
    }
}

impl BirdForm {
    /// Populate the form from an existing bird when editing.
    pub(crate) fn from_bird(bird: &Bird) -> Self {
        Self {
            name: bird.name.clone(),
            info: bird.info.clone(),
            species: bird.species,
            active: BirdField::Name,
            error: None,
        }
    }

    /// Move focus forward (or backward) through name, info and species.
    pub(crate) fn next_field(&mut self, backwards: bool) {
        self.active = match (self.active, backwards) {
            (BirdField::Name, false) | (BirdField::Species, true) => BirdField::Info,
            (BirdField::Info, false) | (BirdField::Name, true) => BirdField::Species,
            (BirdField::Species, false) | (BirdField::Info, true) => BirdField::Name,
        };
    }

    /// Step the species picker when it has focus.
    pub(crate) fn cycle_species(&mut self, offset: isize) -> bool {
        if self.active != BirdField::Species {
            return false;
        }
        self.species = self.species.cycle(offset);
        true
    }

    /// Append a character to the active text field.
    pub(crate) fn push_char(&mut self, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        match self.active {
            BirdField::Name => self.name.push(ch),
            BirdField::Info => self.info.push(ch),
            BirdField::Species => return false,
        }
        true
    }

    pub(crate) fn backspace(&mut self) {
        match self.active {
            BirdField::Name => {
                self.name.pop();
            }
            BirdField::Info => {
                self.info.pop();
            }
            BirdField::Species => {}
        }
    }

    pub(crate) fn to_new_bird(&self) -> NewBird {
        NewBird {
            name: self.name.trim().to_string(),
            species: self.species,
            info: self.info.trim().to_string(),
        }
    }

    /// Apply the form to a copy of `bird`, keeping its id and details.
    pub(crate) fn apply_to(&self, bird: &Bird) -> Bird {
        Bird {
            name: self.name.trim().to_string(),
            info: self.info.trim().to_string(),
            species: self.species,
            ..bird.clone()
        }
    }

    /// Render a single line for the form widget.
    pub(crate) fn build_line(&self, field_name: &str, field: BirdField) -> Line<'static> {
        let is_active = self.active == field;
        let display = match field {
            BirdField::Name | BirdField::Info => {
                let value = self.value(field);
                if value.is_empty() {
                    "<required>".to_string()
                } else {
                    value.to_string()
                }
            }
            BirdField::Species => format!("< {} >", self.species),
        };

        let style = if is_active {
            Style::default().fg(Color::Yellow)
        } else if field != BirdField::Species && self.value(field).is_empty() {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        Line::from(vec![
            Span::raw(format!("{field_name}: ")),
            Span::styled(display, style),
        ])
    }

    fn value(&self, field: BirdField) -> &str {
        match field {
            BirdField::Name => &self.name,
            BirdField::Info => &self.info,
            BirdField::Species => "",
        }
    }

    /// Return the character count for the requested field.
    pub(crate) fn value_len(&self, field: BirdField) -> usize {
        self.value(field).chars().count()
    }
}

#[derive(Clone)]
pub(crate) struct ConfirmBirdDelete {
    pub(crate) id: i64,
    pub(crate) name: String,
}

impl ConfirmBirdDelete {
    pub(crate) fn from(bird: &Bird) -> Self {
        Self {
            id: bird.id,
            name: bird.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_goes_to_the_active_field() {
        let mut form = BirdForm::default();
        for ch in "Hoot".chars() {
            form.push_char(ch);
        }
        form.next_field(false);
        for ch in "night owl".chars() {
            form.push_char(ch);
        }
        form.backspace();

        assert_eq!(form.name, "Hoot");
        assert_eq!(form.info, "night ow");
        assert_eq!(form.value_len(BirdField::Info), 8);
    }

    #[test]
    fn species_only_cycles_with_focus() {
        let mut form = BirdForm::default();
        assert!(!form.cycle_species(1));
        assert_eq!(form.species, Species::Cardinal);

        form.next_field(true);
        assert!(form.active == BirdField::Species);
        assert!(!form.push_char('x'));
        assert!(form.cycle_species(-1));
        assert_eq!(form.species, Species::Penguin);
    }

    #[test]
    fn edit_keeps_identity() {
        let bird = Bird {
            id: 4,
            ..Bird::new("Pip", Species::Sparrow, "tiny")
        };
        let mut form = BirdForm::from_bird(&bird);
        form.name.push_str(" II");

        let updated = form.apply_to(&bird);
        assert_eq!(updated.id, 4);
        assert_eq!(updated.name, "Pip II");
        assert_eq!(updated.created_at, bird.created_at);
    }
}
