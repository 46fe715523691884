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
use futures::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub mod dialog;

/// The contacts whose names start with the same letter.
#[derive(Debug, Clone, PartialEq, Serialize, Getters)]
#[get = "pub"]
pub struct ContactGroup {
    letter: String,
    contacts: Vec<Contact>,
}

fn letter(name: &str) -> String {
    name.trim()
        .chars()
        .next()
        .map(|first| first.to_uppercase().collect())
        .unwrap_or_default()
}

/// Buckets contacts by the uppercase first letter of their name.
///
/// Groups are sorted by letter, contacts keep their order inside a group. Blank names are grouped
/// under the empty letter, which sorts first.
pub fn group_contacts(contacts: &[Contact]) -> Vec<ContactGroup> {
    let mut groups: Vec<ContactGroup> = Vec::new();

    for contact in contacts {
        let letter = letter(contact.name());
        match groups.iter_mut().find(|group| group.letter == letter) {
            Some(group) => group.contacts.push(contact.clone()),
            None => groups.push(ContactGroup {
                letter,
                contacts: vec![contact.clone()],
            }),
        }
    }

    // stable, so equal letters cannot reorder anything
    groups.sort_by(|a, b| a.letter.cmp(&b.letter));
    groups
}

/// "Anton Mayer" becomes "AM", "madonna" becomes "M".
pub fn initials(name: &str) -> String {
    let mut tokens = name.split_whitespace();

    let Some(first) = tokens.next() else {
        return String::new();
    };
    let mut initials = letter(first);
    if let Some(last) = tokens.last() {
        initials.push_str(&letter(last));
    }

    initials
}

/// Follows the live contact list and publishes it grouped by letter.
pub struct ContactsViewModel {
    groups: watch::Receiver<Vec<ContactGroup>>,
    shutdown: kanal::AsyncSender<()>,
    handle: JoinHandle<()>,
}

impl ContactsViewModel {
    pub async fn spawn(database: &Database) -> Result<Self> {
        let mut contacts = database.watch_contacts().await?;
        let (sender, groups) = watch::channel(Vec::new());
        let (shutdown, receiver) = kanal::unbounded_async::<()>();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    next = contacts.next() => match next {
                        Some(Ok(contacts)) => {
                            sender.send_replace(group_contacts(&contacts));
                        }
                        Some(Err(error)) => {
                            error!("Error occurred on the contacts live query: {}", error);
                            break;
                        }
                        None => break,
                    },
                    _ = receiver.recv() => {
                        debug!("Received shutdown signal on kanal receiver");
                        break;
                    }
                }
            }
        });

        Ok(Self {
            groups,
            shutdown,
            handle,
        })
    }

    pub fn groups(&self) -> Vec<ContactGroup> {
        self.groups.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<ContactGroup>> {
        self.groups.clone()
    }

    pub async fn shutdown(self) {
        // the loop may already be gone
        self.shutdown.send(()).await.ok();
    }
}

impl Drop for ContactsViewModel {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
