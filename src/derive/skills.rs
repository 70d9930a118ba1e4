//! Skill picker state.

use color_eyre::{eyre::Report, Result};

use crate::api::types::{Id, Skill};
use crate::error::SyncError;

/// Most skills a worker may select.
pub const MAX_SKILLS: usize = 3;

const DEFAULT_CATEGORY: &str = "Other";

#[derive(Debug, Clone, PartialEq)]
pub struct SkillItem {
  pub skill: Skill,
  pub checked: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillCategory {
  pub name: String,
  pub items: Vec<SkillItem>,
}

/// All skills grouped by category, in first-seen order, with the worker's
/// selection marked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillBoard {
  pub categories: Vec<SkillCategory>,
}

impl SkillBoard {
  /// Build the board. When the server reports no skills for the worker the
  /// cached selection is used instead.
  pub fn from_skills(all: &[Skill], mine: &[Skill], cached: &[Skill]) -> Self {
    let selected: Vec<&Id> = if mine.is_empty() {
      cached.iter().map(|s| &s.id).collect()
    } else {
      mine.iter().map(|s| &s.id).collect()
    };

    let mut board = Self::default();
    for skill in all {
      let category = skill
        .category
        .clone()
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

      let item = SkillItem {
        skill: Skill {
          category: Some(category.clone()),
          ..skill.clone()
        },
        checked: selected.contains(&&skill.id),
      };

      match board.categories.iter_mut().find(|c| c.name == category) {
        Some(existing) => existing.items.push(item),
        None => board.categories.push(SkillCategory {
          name: category,
          items: vec![item],
        }),
      }
    }
    board
  }

  fn items(&self) -> impl Iterator<Item = &SkillItem> {
    self.categories.iter().flat_map(|c| c.items.iter())
  }

  pub fn selected_count(&self) -> usize {
    self.items().filter(|i| i.checked).count()
  }

  pub fn selected_ids(&self) -> Vec<Id> {
    self
      .items()
      .filter(|i| i.checked)
      .map(|i| i.skill.id.clone())
      .collect()
  }

  /// Selected skills in the shape the my-skills endpoint returns.
  pub fn selected_skills(&self) -> Vec<Skill> {
    self
      .items()
      .filter(|i| i.checked)
      .map(|i| i.skill.clone())
      .collect()
  }

  /// Flip one skill. Unchecking always succeeds; checking fails with a
  /// validation error once `MAX_SKILLS` are selected, leaving the board as is.
  ///
  /// Returns the new checked state.
  pub fn toggle(&mut self, id: &Id) -> Result<bool> {
    let count = self.selected_count();
    let item = self
      .categories
      .iter_mut()
      .flat_map(|c| c.items.iter_mut())
      .find(|i| &i.skill.id == id)
      .ok_or_else(|| Report::new(SyncError::Validation(format!("Unknown skill {}", id))))?;

    if !item.checked && count >= MAX_SKILLS {
      return Err(Report::new(SyncError::Validation(format!(
        "At most {} skills can be selected",
        MAX_SKILLS
      ))));
    }

    item.checked = !item.checked;
    Ok(item.checked)
  }

  /// Selected ids, provided there are between 1 and `MAX_SKILLS`.
  pub fn validate_for_save(&self) -> Result<Vec<Id>> {
    let ids = self.selected_ids();
    if ids.is_empty() {
      return Err(Report::new(SyncError::Validation(
        "Select at least one skill".to_string(),
      )));
    }
    if ids.len() > MAX_SKILLS {
      return Err(Report::new(SyncError::Validation(format!(
        "At most {} skills can be selected",
        MAX_SKILLS
      ))));
    }
    Ok(ids)
  }

  /// Mark exactly the given ids as checked.
  pub fn apply_selection(&mut self, ids: &[Id]) {
    for item in self.categories.iter_mut().flat_map(|c| c.items.iter_mut()) {
      item.checked = ids.contains(&item.skill.id);
    }
  }
}
