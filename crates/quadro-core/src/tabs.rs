//! Secondary partition applied on top of
//! bucket membership, based on how the
//! viewing user relates to each task.

use std::collections::BTreeSet;
use std::fmt;

use crate::task::{
  CurrentUser,
  Task,
  TeamId
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
)]
pub enum TaskTab {
  #[default]
  Mine,
  Team,
  Collaborative
}

impl TaskTab {
  pub const ALL: [TaskTab; 3] = [
    TaskTab::Mine,
    TaskTab::Team,
    TaskTab::Collaborative
  ];

  pub fn parse(
    raw: &str
  ) -> Option<Self> {
    match raw.trim() {
      | "minhas" | "mine" => {
        Some(Self::Mine)
      }
      | "equipe" | "team" => {
        Some(Self::Team)
      }
      | "colaborativas"
      | "collaborative" => {
        Some(Self::Collaborative)
      }
      | _ => None
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      | Self::Mine => "minhas",
      | Self::Team => "equipe",
      | Self::Collaborative => {
        "colaborativas"
      }
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | Self::Mine => "Minhas",
      | Self::Team => "Equipe",
      | Self::Collaborative => {
        "Colaborativas"
      }
    }
  }
}

impl fmt::Display for TaskTab {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Precomputed view of the user so the
/// per-task rules stay cheap.
struct Viewer<'a> {
  user:     &'a CurrentUser,
  teams:    BTreeSet<TeamId>,
  manager:  bool
}

impl<'a> Viewer<'a> {
  fn new(user: &'a CurrentUser) -> Self {
    Self {
      user,
      teams: user.team_ids(),
      manager: user.is_manager()
    }
  }

  fn is_mine(
    &self,
    task: &Task
  ) -> bool {
    task.owner == self.user.id
      && task.assigned_by.is_none_or(
        |by| by == self.user.id
      )
  }

  fn assigned_to_me_by_others(
    &self,
    task: &Task
  ) -> bool {
    task.owner == self.user.id
      && task.assigned_by.is_some_and(
        |by| by != self.user.id
      )
  }

  fn multi_assigned_includes_me(
    &self,
    task: &Task
  ) -> bool {
    task
      .collaborators
      .contains(&self.user.id)
      && (task.collaborators.len() > 1
        || task.owner != self.user.id)
  }

  fn i_assigned_to_others(
    &self,
    task: &Task
  ) -> bool {
    self.manager
      && task.assigned_by
        == Some(self.user.id)
      && task.owner != self.user.id
  }

  fn in_my_team(
    &self,
    task: &Task
  ) -> bool {
    match task.team {
      | None => true,
      | Some(team) => {
        self.teams.is_empty()
          || self.teams.contains(&team)
      }
    }
  }

  fn is_team(
    &self,
    task: &Task
  ) -> bool {
    self.in_my_team(task)
      && (self
        .assigned_to_me_by_others(task)
        || self
          .multi_assigned_includes_me(
            task
          )
        || self
          .i_assigned_to_others(task))
  }

  fn matches(
    &self,
    tab: TaskTab,
    task: &Task
  ) -> bool {
    match tab {
      | TaskTab::Mine => {
        self.is_mine(task)
      }
      | TaskTab::Team => {
        self.is_team(task)
      }
      | TaskTab::Collaborative => {
        task
          .collaborators
          .contains(&self.user.id)
      }
    }
  }
}

/// Tasks visible under `tab`. Without a
/// known user nothing is filtered.
pub fn filter_tasks<'t, I>(
  tasks: I,
  tab: TaskTab,
  user: Option<&CurrentUser>
) -> Vec<Task>
where
  I: IntoIterator<Item = &'t Task>
{
  let Some(user) = user else {
    return tasks
      .into_iter()
      .cloned()
      .collect();
  };
  let viewer = Viewer::new(user);
  tasks
    .into_iter()
    .filter(|task| {
      viewer.matches(tab, task)
    })
    .cloned()
    .collect()
}

pub fn matches_tab(
  task: &Task,
  tab: TaskTab,
  user: Option<&CurrentUser>
) -> bool {
  user.is_none_or(|user| {
    Viewer::new(user).matches(tab, task)
  })
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
)]
pub struct TabCounts {
  pub my_tasks:            usize,
  pub team_tasks:          usize,
  pub collaborative_tasks: usize
}

impl TabCounts {
  /// The collaborative count uses the
  /// stricter multi-assignment rule, so it
  /// can be lower than the collaborative
  /// tab's length.
  #[tracing::instrument(skip_all, fields(count = tasks.len()))]
  pub fn compute(
    tasks: &[Task],
    user: Option<&CurrentUser>
  ) -> Self {
    let Some(user) = user else {
      return Self::default();
    };
    let viewer = Viewer::new(user);

    let mut counts = Self::default();
    for task in tasks {
      if viewer.is_mine(task) {
        counts.my_tasks += 1;
      }
      if viewer.is_team(task) {
        counts.team_tasks += 1;
      }
      if viewer
        .multi_assigned_includes_me(task)
      {
        counts.collaborative_tasks += 1;
      }
    }
    counts
  }

  pub fn get(
    &self,
    tab: TaskTab
  ) -> usize {
    match tab {
      | TaskTab::Mine => self.my_tasks,
      | TaskTab::Team => self.team_tasks,
      | TaskTab::Collaborative => {
        self.collaborative_tasks
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::task::{
    TaskId,
    TeamMembership,
    UserId
  };

  const ME: UserId = UserId(1);
  const OTHER: UserId = UserId(2);

  fn me(manager: bool) -> CurrentUser {
    CurrentUser {
      id:       ME,
      username: "ana".to_string(),
      is_admin: false,
      roles:    vec![],
      teams:    vec![TeamMembership {
        team:       TeamId(10),
        is_manager: manager
      }]
    }
  }

  fn task(
    id: u64,
    owner: UserId,
    assigned_by: Option<UserId>
  ) -> Task {
    let mut t = Task::new(
      TaskId(id),
      format!("t{id}"),
      owner
    );
    t.assigned_by = assigned_by;
    t
  }

  fn ids(tasks: &[Task]) -> Vec<u64> {
    tasks
      .iter()
      .map(|t| t.id.0)
      .collect()
  }

  #[test]
  fn mine_requires_self_assignment() {
    let tasks = vec![
      task(1, ME, None),
      task(2, ME, Some(ME)),
      task(3, ME, Some(OTHER)),
      task(4, OTHER, None)
    ];
    let user = me(false);
    let mine = filter_tasks(
      &tasks,
      TaskTab::Mine,
      Some(&user)
    );
    assert_eq!(ids(&mine), vec![1, 2]);
  }

  #[test]
  fn team_tab_combines_assignment_rules_within_my_teams()
   {
    let mut shared = task(5, OTHER, None);
    shared.collaborators =
      [ME, OTHER].into_iter().collect();
    let mut foreign_team =
      task(6, ME, Some(OTHER));
    foreign_team.team = Some(TeamId(99));
    let mut own_team =
      task(7, ME, Some(OTHER));
    own_team.team = Some(TeamId(10));
    let delegated =
      task(8, OTHER, Some(ME));

    let tasks = vec![
      task(3, ME, Some(OTHER)),
      shared,
      foreign_team,
      own_team,
      delegated
    ];

    let member = me(false);
    let team = filter_tasks(
      &tasks,
      TaskTab::Team,
      Some(&member)
    );
    assert_eq!(ids(&team), vec![3, 5, 7]);

    let manager = me(true);
    let team = filter_tasks(
      &tasks,
      TaskTab::Team,
      Some(&manager)
    );
    assert_eq!(
      ids(&team),
      vec![3, 5, 7, 8]
    );
  }

  #[test]
  fn counts_use_stricter_collaboration_rule()
   {
    let mut solo = task(1, ME, None);
    solo.collaborators =
      [ME].into_iter().collect();
    let mut shared = task(2, OTHER, None);
    shared.collaborators =
      [ME].into_iter().collect();

    let tasks = vec![solo, shared];
    let user = me(false);

    let collab = filter_tasks(
      &tasks,
      TaskTab::Collaborative,
      Some(&user)
    );
    assert_eq!(ids(&collab), vec![1, 2]);

    let counts =
      TabCounts::compute(&tasks, Some(&user));
    assert_eq!(counts, TabCounts {
      my_tasks:            1,
      team_tasks:          1,
      collaborative_tasks: 1
    });
    assert_eq!(
      counts.get(TaskTab::Collaborative),
      1
    );
  }

  #[test]
  fn unknown_user_sees_everything() {
    let tasks = vec![
      task(1, OTHER, None),
      task(2, ME, Some(OTHER))
    ];
    assert_eq!(
      filter_tasks(
        &tasks,
        TaskTab::Mine,
        None
      )
      .len(),
      2
    );
    assert!(matches_tab(
      &tasks[0],
      TaskTab::Team,
      None
    ));
    assert_eq!(
      TabCounts::compute(&tasks, None),
      TabCounts::default()
    );
  }

  #[test]
  fn tab_ids_round_trip() {
    for tab in TaskTab::ALL {
      assert_eq!(
        TaskTab::parse(tab.as_str()),
        Some(tab)
      );
    }
    assert_eq!(
      TaskTab::parse("team"),
      Some(TaskTab::Team)
    );
    assert_eq!(
      TaskTab::parse("todas"),
      None
    );
  }
}
