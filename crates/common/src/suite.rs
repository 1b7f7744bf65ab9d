//! Ordering engine: positional insert, update, cascading remove and clone
//!
//! Every operation either applies completely or leaves the suite untouched.
//! Removing a group drops its tests and their commands with it; cloning a
//! group or test deep-copies its descendants under fresh ids and rewrites
//! their back-references to the new ancestor.

use crate::error::EntityKind;
use crate::ordered::OrderedMap;
use crate::types::*;
use crate::{Error, Result};
use tracing::debug;

fn place<T>(
    map: &mut OrderedMap<T>,
    kind: EntityKind,
    id: String,
    value: T,
    position: &Position,
) -> Result<String> {
    match map.insert_after(id.clone(), value, position.after.as_deref()) {
        Ok(_) => Ok(id),
        Err(_) => Err(Error::duplicate(kind, id)),
    }
}

impl Command {
    /// Copy with a fresh id, re-parented under `test_id`/`group_id`
    fn duplicate(&self, test_id: &str, group_id: &str) -> Command {
        Command {
            id: generate_id(),
            test_id: test_id.to_string(),
            group_id: group_id.to_string(),
            ..self.clone()
        }
    }
}

impl Test {
    /// Deep copy with fresh ids for the test and every command
    fn duplicate(&self, group_id: &str) -> Result<Test> {
        let id = generate_id();
        let mut commands = OrderedMap::new();
        for command in self.commands.values() {
            let copy = command.duplicate(&id, group_id);
            place(&mut commands, EntityKind::Command, copy.id.clone(), copy, &Position::end())?;
        }
        Ok(Test {
            id,
            group_id: group_id.to_string(),
            title: self.title.clone(),
            commands,
        })
    }
}

impl Suite {
    fn group_mut(&mut self, id: &str) -> Result<&mut Group> {
        self.groups
            .get_mut(id)
            .ok_or_else(|| Error::not_found(EntityKind::Group, id))
    }

    fn test_mut(&mut self, group_id: &str, id: &str) -> Result<&mut Test> {
        self.group_mut(group_id)?
            .tests
            .get_mut(id)
            .ok_or_else(|| Error::not_found(EntityKind::Test, id))
    }

    fn touch(&mut self) {
        self.modified = true;
    }

    // ========================================================================
    // Targets
    // ========================================================================

    pub fn add_target(&mut self, options: TargetOptions, id: Option<String>) -> Result<String> {
        self.insert_adjacent_target(options, &Position::end(), id)
    }

    pub fn insert_adjacent_target(
        &mut self,
        options: TargetOptions,
        position: &Position,
        id: Option<String>,
    ) -> Result<String> {
        let id = id.unwrap_or_else(generate_id);
        let target = Target {
            id: id.clone(),
            target: options.target,
            selector: options.selector,
        };
        let id = place(&mut self.targets, EntityKind::Target, id, target, position)?;
        self.touch();
        Ok(id)
    }

    pub fn update_target(&mut self, patch: TargetPatch) -> Result<()> {
        let target = self
            .targets
            .get_mut(&patch.id)
            .ok_or_else(|| Error::not_found(EntityKind::Target, &patch.id))?;
        if let Some(label) = patch.target {
            target.target = label;
        }
        if let Some(selector) = patch.selector {
            target.selector = selector;
        }
        self.touch();
        Ok(())
    }

    pub fn remove_target(&mut self, id: &str) -> Result<Target> {
        let removed = self
            .targets
            .remove(id)
            .ok_or_else(|| Error::not_found(EntityKind::Target, id))?;
        self.touch();
        Ok(removed)
    }

    /// Shallow copy placed right after the source
    pub fn clone_target(&mut self, id: &str) -> Result<String> {
        let source = self
            .targets
            .get(id)
            .ok_or_else(|| Error::not_found(EntityKind::Target, id))?;
        let options = TargetOptions {
            target: source.target.clone(),
            selector: source.selector.clone(),
        };
        self.insert_adjacent_target(options, &Position::after(id), None)
    }

    pub fn swap_targets(&mut self, a: &str, b: &str) -> Result<()> {
        swap(&mut self.targets, EntityKind::Target, a, b)?;
        self.touch();
        Ok(())
    }

    // ========================================================================
    // Groups
    // ========================================================================

    pub fn add_group(&mut self, options: GroupOptions, id: Option<String>) -> Result<String> {
        self.insert_adjacent_group(options, &Position::end(), id)
    }

    pub fn insert_adjacent_group(
        &mut self,
        options: GroupOptions,
        position: &Position,
        id: Option<String>,
    ) -> Result<String> {
        let id = id.unwrap_or_else(generate_id);
        let group = Group {
            id: id.clone(),
            title: options.title,
            tests: OrderedMap::new(),
        };
        let id = place(&mut self.groups, EntityKind::Group, id, group, position)?;
        self.touch();
        Ok(id)
    }

    pub fn update_group(&mut self, patch: GroupPatch) -> Result<()> {
        let group = self.group_mut(&patch.id)?;
        if let Some(title) = patch.title {
            group.title = title;
        }
        self.touch();
        Ok(())
    }

    /// Remove a group together with its tests and their commands
    pub fn remove_group(&mut self, id: &str) -> Result<Group> {
        let removed = self
            .groups
            .remove(id)
            .ok_or_else(|| Error::not_found(EntityKind::Group, id))?;
        debug!(
            "Removed group {} with {} test(s) and {} command(s)",
            id,
            removed.tests.len(),
            removed.tests.values().map(|t| t.commands.len()).sum::<usize>()
        );
        self.touch();
        Ok(removed)
    }

    /// Deep copy placed right after the source group
    pub fn clone_group(&mut self, id: &str) -> Result<String> {
        let source = self
            .groups
            .get(id)
            .ok_or_else(|| Error::not_found(EntityKind::Group, id))?;

        let new_id = generate_id();
        let mut tests = OrderedMap::new();
        for test in source.tests.values() {
            let copy = test.duplicate(&new_id)?;
            place(&mut tests, EntityKind::Test, copy.id.clone(), copy, &Position::end())?;
        }
        let copy = Group {
            id: new_id.clone(),
            title: source.title.clone(),
            tests,
        };

        let new_id =
            place(&mut self.groups, EntityKind::Group, new_id, copy, &Position::after(id))?;
        self.touch();
        Ok(new_id)
    }

    pub fn swap_groups(&mut self, a: &str, b: &str) -> Result<()> {
        swap(&mut self.groups, EntityKind::Group, a, b)?;
        self.touch();
        Ok(())
    }

    // ========================================================================
    // Tests
    // ========================================================================

    pub fn add_test(&mut self, options: TestOptions, id: Option<String>) -> Result<String> {
        self.insert_adjacent_test(options, &Position::end(), id)
    }

    pub fn insert_adjacent_test(
        &mut self,
        options: TestOptions,
        position: &Position,
        id: Option<String>,
    ) -> Result<String> {
        let id = id.unwrap_or_else(generate_id);
        let group = self.group_mut(&options.group_id)?;
        let test = Test {
            id: id.clone(),
            group_id: options.group_id,
            title: options.title,
            commands: OrderedMap::new(),
        };
        let id = place(&mut group.tests, EntityKind::Test, id, test, position)?;
        self.touch();
        Ok(id)
    }

    pub fn update_test(&mut self, patch: TestPatch) -> Result<()> {
        let test = self.test_mut(&patch.group_id, &patch.id)?;
        if let Some(title) = patch.title {
            test.title = title;
        }
        self.touch();
        Ok(())
    }

    /// Remove a test together with its commands
    pub fn remove_test(&mut self, test: &TestRef) -> Result<Test> {
        let removed = self
            .group_mut(&test.group_id)?
            .tests
            .remove(&test.id)
            .ok_or_else(|| Error::not_found(EntityKind::Test, &test.id))?;
        self.touch();
        Ok(removed)
    }

    /// Deep copy placed right after the source test
    pub fn clone_test(&mut self, test: &TestRef) -> Result<String> {
        let group = self.group_mut(&test.group_id)?;
        let source = group
            .tests
            .get(&test.id)
            .ok_or_else(|| Error::not_found(EntityKind::Test, &test.id))?;
        let copy = source.duplicate(&test.group_id)?;
        let after = Position::after(&test.id);
        let id = place(&mut group.tests, EntityKind::Test, copy.id.clone(), copy, &after)?;
        self.touch();
        Ok(id)
    }

    pub fn swap_tests(&mut self, group_id: &str, a: &str, b: &str) -> Result<()> {
        let group = self.group_mut(group_id)?;
        swap(&mut group.tests, EntityKind::Test, a, b)?;
        self.touch();
        Ok(())
    }

    // ========================================================================
    // Commands
    // ========================================================================

    pub fn add_command(&mut self, options: CommandOptions, id: Option<String>) -> Result<String> {
        self.insert_adjacent_command(options, &Position::end(), id)
    }

    pub fn insert_adjacent_command(
        &mut self,
        options: CommandOptions,
        position: &Position,
        id: Option<String>,
    ) -> Result<String> {
        let id = id.unwrap_or_else(generate_id);
        let test = self.test_mut(&options.group_id, &options.test_id)?;
        let command = Command {
            id: id.clone(),
            test_id: options.test_id,
            group_id: options.group_id,
            target: options.target,
            method: options.method,
            params: options.params,
            failure: String::new(),
        };
        let id = place(&mut test.commands, EntityKind::Command, id, command, position)?;
        self.touch();
        Ok(id)
    }

    pub fn update_command(&mut self, patch: CommandPatch) -> Result<()> {
        let command = self
            .test_mut(&patch.group_id, &patch.test_id)?
            .commands
            .get_mut(&patch.id)
            .ok_or_else(|| Error::not_found(EntityKind::Command, &patch.id))?;
        if let Some(target) = patch.target {
            command.target = target;
        }
        if let Some(method) = patch.method {
            command.method = method;
        }
        if let Some(params) = patch.params {
            command.params = params;
        }
        if let Some(failure) = patch.failure {
            command.failure = failure;
        }
        self.touch();
        Ok(())
    }

    pub fn remove_command(&mut self, command: &CommandRef) -> Result<Command> {
        let removed = self
            .test_mut(&command.group_id, &command.test_id)?
            .commands
            .remove(&command.id)
            .ok_or_else(|| Error::not_found(EntityKind::Command, &command.id))?;
        self.touch();
        Ok(removed)
    }

    /// Shallow copy placed right after the source command
    pub fn clone_command(&mut self, command: &CommandRef) -> Result<String> {
        let test = self.test_mut(&command.group_id, &command.test_id)?;
        let source = test
            .commands
            .get(&command.id)
            .ok_or_else(|| Error::not_found(EntityKind::Command, &command.id))?;
        let copy = source.duplicate(&command.test_id, &command.group_id);
        let after = Position::after(&command.id);
        let id = place(&mut test.commands, EntityKind::Command, copy.id.clone(), copy, &after)?;
        self.touch();
        Ok(id)
    }

    pub fn swap_commands(&mut self, group_id: &str, test_id: &str, a: &str, b: &str) -> Result<()> {
        let test = self.test_mut(group_id, test_id)?;
        swap(&mut test.commands, EntityKind::Command, a, b)?;
        self.touch();
        Ok(())
    }

    /// Clear the failure text left by the last run. Returns how many
    /// commands were reset.
    pub fn reset_command_failures(&mut self) -> usize {
        let mut reset = 0;
        for group in self.groups.values_mut() {
            for test in group.tests.values_mut() {
                for command in test.commands.values_mut() {
                    if !command.failure.is_empty() {
                        command.failure.clear();
                        reset += 1;
                    }
                }
            }
        }
        if reset > 0 {
            self.touch();
        }
        reset
    }
}

fn swap<T>(map: &mut OrderedMap<T>, kind: EntityKind, a: &str, b: &str) -> Result<()> {
    for id in [a, b] {
        if !map.contains_key(id) {
            return Err(Error::not_found(kind, id));
        }
    }
    map.swap(a, b);
    Ok(())
}
