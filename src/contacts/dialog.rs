/*
 *     Copyright (C) 2023  Fritz Ochsmann
 *
 *     This program is free software: you can redistribute it and/or modify
 *     it under the terms of the GNU Affero General Public License as published
 *     by the Free Software Foundation, either version 3 of the License, or
 *     (at your option) any later version.
 *
 *     This program is distributed in the hope that it will be useful,
 *     but WITHOUT ANY WARRANTY; without even the implied warranty of
 *     MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *     GNU Affero General Public License for more details.
 *
 *     You should have received a copy of the GNU Affero General Public License
 *     along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use crate::prelude::*;
use crate::ui::colors::ColorRotation;
use crate::ui::Dialog;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL: Regex = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap();
}

/// The editable fields of a contact.
#[derive(Debug, Clone, Default, PartialEq, Getters, Setters)]
#[getset(get = "pub", set = "pub")]
pub struct ContactDraft {
    name: String,
    email: String,
    phone: String,
}

impl ContactDraft {
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && EMAIL.is_match(self.email.trim())
    }
}

impl From<&Contact> for ContactDraft {
    fn from(contact: &Contact) -> Self {
        Self {
            name: contact.name().clone(),
            email: contact.email().clone(),
            phone: contact.phone().clone(),
        }
    }
}

/// State of the contact dialog and of the context menu next to the contact details.
#[derive(Debug, Clone, Getters)]
pub struct ContactEditor {
    database: Database,
    #[get = "pub"]
    contact: Option<Contact>,
    #[get = "pub"]
    draft: ContactDraft,
    #[get = "pub"]
    dialog: Dialog,
    #[get = "pub"]
    menu: Dialog,
}

impl ContactEditor {
    pub fn new(database: &Database) -> Self {
        Self {
            database: database.clone(),
            contact: None,
            draft: ContactDraft::default(),
            dialog: Dialog::default(),
            menu: Dialog::default(),
        }
    }

    /// Opens the dialog for an existing contact.
    pub fn edit(&mut self, contact: &Contact) {
        self.draft = ContactDraft::from(contact);
        self.contact = Some(contact.clone());
        self.dialog.open();
    }

    /// Opens the dialog with an empty form.
    pub fn create(&mut self) {
        self.draft = ContactDraft::default();
        self.contact = None;
        self.dialog.open();
    }

    pub fn draft_mut(&mut self) -> &mut ContactDraft {
        &mut self.draft
    }

    pub fn toggle_menu(&self) {
        if self.menu.is_open() {
            self.menu.close();
        } else {
            self.menu.open();
        }
    }

    pub fn close_menu(&self) {
        self.menu.close();
    }

    fn id(&self) -> Option<&Id> {
        self.contact.as_ref().and_then(|contact| contact.id().as_ref())
    }

    /// Persists the draft onto the edited contact and closes the dialog.
    ///
    /// Does nothing when the draft is invalid or no persisted contact is being edited.
    #[instrument(skip(self))]
    pub async fn save_edit(&mut self) -> Result<()> {
        let Some(id) = self.id().cloned() else {
            debug!("No persisted contact is being edited");
            return Ok(());
        };
        if !self.draft.is_valid() {
            debug!("Contact form is invalid");
            return Ok(());
        }

        let contact = WriteContact::from(&self.database)
            .set_target(Some(&id))
            .set_name(Some(self.draft.name.trim().to_owned()))
            .set_email(Some(self.draft.email.trim().to_owned()))
            .set_phone(Some(self.draft.phone.trim().to_owned()))
            .to_owned()
            .await?;
        self.contact = Some(contact);
        self.dialog.close();

        Ok(())
    }

    /// Creates a contact from the draft with the next rotation color and closes the dialog.
    ///
    /// Returns `None` without touching the database when the draft is invalid.
    #[instrument(skip(self))]
    pub async fn save_new(&mut self) -> Result<Option<Contact>> {
        if !self.draft.is_valid() {
            debug!("Contact form is invalid");
            return Ok(None);
        }

        let color = ColorRotation::load(&self.database)
            .await?
            .next_color()
            .await?;
        let contact = WriteContact::from(&self.database)
            .set_name(Some(self.draft.name.trim().to_owned()))
            .set_email(Some(self.draft.email.trim().to_owned()))
            .set_phone(Some(self.draft.phone.trim().to_owned()))
            .set_color(Some(color.to_owned()))
            .to_owned()
            .await?;
        self.contact = Some(contact.clone());
        self.dialog.close();

        Ok(Some(contact))
    }

    /// Deletes the selected contact, closing the context menu first and the dialog afterwards.
    ///
    /// Does nothing when no persisted contact is selected.
    #[instrument(skip(self))]
    pub async fn delete_contact(&mut self) -> Result<()> {
        let Some(id) = self.id().cloned() else {
            debug!("No persisted contact is selected");
            return Ok(());
        };

        self.menu.close();
        self.database.delete_contact(&id).await?;
        self.contact = None;
        self.dialog.close();

        Ok(())
    }
}
