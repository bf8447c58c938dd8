use std::{collections::HashMap, sync::Arc};

use vpvl2_loader::loader::Loader;

use crate::{
    diagnostics::Diagnostics,
    error::Vpvl2Error,
    motion::Motion,
    physics_engine::PhysicsEngine,
    player::{BlendMode, MotionConfiguration, MotionOptions},
    scene_controller::{ModelHandle, SceneController},
};

const SEPARATOR: char = '|';

/// Options carried by `MOTION_ADD` and the camera and light commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionArguments {
    pub full: bool,
    pub once: bool,
    pub enable_smooth_transition: bool,
    pub enable_re_position: bool,
    pub priority: i32,
}

impl Default for MotionArguments {
    fn default() -> Self {
        let options = MotionOptions::default();
        Self {
            full: options.full,
            once: options.once,
            enable_smooth_transition: options.enable_smooth_transition,
            enable_re_position: options.enable_re_position,
            priority: options.priority,
        }
    }
}

impl From<MotionArguments> for MotionOptions {
    fn from(v: MotionArguments) -> Self {
        Self {
            full: v.full,
            once: v.once,
            enable_smooth_transition: v.enable_smooth_transition,
            enable_re_position: v.enable_re_position,
            priority: v.priority,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `MODEL_ADD|alias|location`
    ModelAdd { alias: String, location: String },
    /// `MODEL_DELETE|alias`
    ModelDelete { alias: String },
    /// `MOTION_ADD|alias|slot|location[|FULL/PART[|ONCE/LOOP[|ON/OFF[|ON/OFF[|priority]]]]]`
    ///
    /// The two switches are the smooth transition and re-positioning.
    MotionAdd {
        alias: String,
        slot: String,
        location: String,
        arguments: MotionArguments,
    },
    /// `MOTION_CHANGE|alias|slot|location`
    MotionChange {
        alias: String,
        slot: String,
        location: String,
    },
    /// `MOTION_DELETE|alias|slot`
    MotionDelete { alias: String, slot: String },
    /// `MOTION_CONFIGURE|alias|slot|key=value...` with keys `weight`, `speed`, `priority`,
    /// `blend` (`REPLACE`/`ADD`) and `once` (`ON`/`OFF`).
    MotionConfigure {
        alias: String,
        slot: String,
        configuration: MotionConfiguration,
    },
    /// `CAMERA_MOTION[|location[|ONCE/LOOP]]`. An empty location removes the motion.
    CameraMotion {
        location: Option<String>,
        arguments: MotionArguments,
    },
    /// `LIGHT_MOTION[|location[|ONCE/LOOP]]`
    LightMotion {
        location: Option<String>,
        arguments: MotionArguments,
    },
}

struct Arguments<'a> {
    command: &'a str,
    values: Vec<&'a str>,
}

impl<'a> Arguments<'a> {
    fn expect_len(&self, min: usize, max: usize) -> Result<(), Vpvl2Error> {
        let len = self.values.len();
        if len < min || len > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{} to {}", min, max)
            };
            return Err(Vpvl2Error::invalid_command(format!(
                "{} takes {} arguments but {} were given",
                self.command, expected, len
            )));
        }
        Ok(())
    }

    fn required(&self, index: usize, what: &str) -> Result<String, Vpvl2Error> {
        match self.values.get(index) {
            Some(value) if !value.is_empty() => Ok((*value).to_owned()),
            _ => Err(Vpvl2Error::invalid_command(format!(
                "{} needs a non empty {}",
                self.command, what
            ))),
        }
    }

    fn optional(&self, index: usize) -> Option<&'a str> {
        self.values.get(index).copied().filter(|value| !value.is_empty())
    }

    fn token(&self, index: usize, on: &str, off: &str, default: bool) -> Result<bool, Vpvl2Error> {
        match self.optional(index) {
            None => Ok(default),
            Some(value) => parse_token(self.command, value, on, off),
        }
    }
}

fn parse_token(command: &str, value: &str, on: &str, off: &str) -> Result<bool, Vpvl2Error> {
    if value.eq_ignore_ascii_case(on) {
        Ok(true)
    } else if value.eq_ignore_ascii_case(off) {
        Ok(false)
    } else {
        Err(Vpvl2Error::invalid_command(format!(
            "{} expects {} or {} but got \"{}\"",
            command, on, off, value
        )))
    }
}

fn parse_number<T: std::str::FromStr>(command: &str, key: &str, value: &str) -> Result<T, Vpvl2Error> {
    value.trim().parse::<T>().map_err(|_| {
        Vpvl2Error::invalid_command(format!("{} has a malformed {} \"{}\"", command, key, value))
    })
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, Vpvl2Error> {
        let mut parts = line.trim().split(SEPARATOR).map(str::trim);
        let command = parts.next().unwrap_or_default();
        let args = Arguments {
            command,
            values: parts.collect(),
        };
        match command {
            "MODEL_ADD" => {
                args.expect_len(2, 2)?;
                Ok(Command::ModelAdd {
                    alias: args.required(0, "model alias")?,
                    location: args.required(1, "location")?,
                })
            }
            "MODEL_DELETE" => {
                args.expect_len(1, 1)?;
                Ok(Command::ModelDelete {
                    alias: args.required(0, "model alias")?,
                })
            }
            "MOTION_ADD" => {
                args.expect_len(3, 8)?;
                let defaults = MotionArguments::default();
                let priority = match args.optional(7) {
                    Some(value) => parse_number(command, "priority", value)?,
                    None => defaults.priority,
                };
                Ok(Command::MotionAdd {
                    alias: args.required(0, "model alias")?,
                    slot: args.required(1, "slot")?,
                    location: args.required(2, "location")?,
                    arguments: MotionArguments {
                        full: args.token(3, "FULL", "PART", defaults.full)?,
                        once: args.token(4, "ONCE", "LOOP", defaults.once)?,
                        enable_smooth_transition: args.token(
                            5,
                            "ON",
                            "OFF",
                            defaults.enable_smooth_transition,
                        )?,
                        enable_re_position: args.token(6, "ON", "OFF", defaults.enable_re_position)?,
                        priority,
                    },
                })
            }
            "MOTION_CHANGE" => {
                args.expect_len(3, 3)?;
                Ok(Command::MotionChange {
                    alias: args.required(0, "model alias")?,
                    slot: args.required(1, "slot")?,
                    location: args.required(2, "location")?,
                })
            }
            "MOTION_DELETE" => {
                args.expect_len(2, 2)?;
                Ok(Command::MotionDelete {
                    alias: args.required(0, "model alias")?,
                    slot: args.required(1, "slot")?,
                })
            }
            "MOTION_CONFIGURE" => {
                args.expect_len(3, 7)?;
                let mut configuration = MotionConfiguration::default();
                for pair in &args.values[2..] {
                    let (key, value) = pair.split_once('=').ok_or_else(|| {
                        Vpvl2Error::invalid_command(format!(
                            "{} expects key=value but got \"{}\"",
                            command, pair
                        ))
                    })?;
                    match key.trim() {
                        "weight" => {
                            configuration.blend_weight = Some(parse_number(command, key, value)?)
                        }
                        "speed" => configuration.speed_rate = Some(parse_number(command, key, value)?),
                        "priority" => {
                            configuration.priority = Some(parse_number(command, key, value)?)
                        }
                        "blend" => {
                            configuration.blend_mode =
                                Some(if parse_token(command, value.trim(), "ADD", "REPLACE")? {
                                    BlendMode::Add
                                } else {
                                    BlendMode::Replace
                                })
                        }
                        "once" => {
                            configuration.once = Some(parse_token(command, value.trim(), "ON", "OFF")?)
                        }
                        _ => {
                            return Err(Vpvl2Error::invalid_command(format!(
                                "{} has no option \"{}\"",
                                command, key
                            )))
                        }
                    }
                }
                Ok(Command::MotionConfigure {
                    alias: args.required(0, "model alias")?,
                    slot: args.required(1, "slot")?,
                    configuration,
                })
            }
            "CAMERA_MOTION" | "LIGHT_MOTION" => {
                args.expect_len(0, 2)?;
                let location = args.optional(0).map(str::to_owned);
                let arguments = MotionArguments {
                    once: args.token(1, "ONCE", "LOOP", false)?,
                    ..Default::default()
                };
                if command == "CAMERA_MOTION" {
                    Ok(Command::CameraMotion {
                        location,
                        arguments,
                    })
                } else {
                    Ok(Command::LightMotion {
                        location,
                        arguments,
                    })
                }
            }
            "" => Err(Vpvl2Error::invalid_command("empty command".to_owned())),
            _ => Err(Vpvl2Error::invalid_command(format!(
                "unknown command \"{}\"",
                command
            ))),
        }
    }
}

/// Resolves command arguments through a [`Loader`] and forwards them to a [`SceneController`].
/// Models are addressed by the alias given at `MODEL_ADD`.
pub struct CommandDispatcher<L> {
    loader: L,
    aliases: HashMap<String, ModelHandle>,
}

impl<L: Loader> CommandDispatcher<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            aliases: HashMap::new(),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn resolve(&self, alias: &str) -> Option<ModelHandle> {
        self.aliases.get(alias).copied()
    }

    fn handle(&self, alias: &str) -> Result<ModelHandle, Vpvl2Error> {
        self.resolve(alias)
            .ok_or_else(|| Vpvl2Error::not_found("model", alias))
    }

    fn load_motion<P, D>(
        &self,
        controller: &SceneController<P, D>,
        location: &str,
    ) -> Result<Arc<Motion>, Vpvl2Error>
    where
        P: PhysicsEngine,
        D: Diagnostics,
    {
        let raw = self.loader.load_motion(location)?;
        Ok(Arc::new(Motion::from_raw(&raw, controller.config().bezier)?))
    }

    pub fn execute_line<P, D>(
        &mut self,
        controller: &mut SceneController<P, D>,
        line: &str,
    ) -> Result<(), Vpvl2Error>
    where
        P: PhysicsEngine,
        D: Diagnostics,
    {
        self.execute(controller, Command::parse(line)?)
    }

    pub fn execute<P, D>(
        &mut self,
        controller: &mut SceneController<P, D>,
        command: Command,
    ) -> Result<(), Vpvl2Error>
    where
        P: PhysicsEngine,
        D: Diagnostics,
    {
        match command {
            Command::ModelAdd { alias, location } => {
                if self.aliases.contains_key(&alias) {
                    return Err(Vpvl2Error::invalid_command(format!(
                        "model alias \"{}\" is already in use",
                        alias
                    )));
                }
                let raw = self.loader.load_model(&location)?;
                let handle = controller.add_model(&raw)?;
                self.aliases.insert(alias, handle);
            }
            Command::ModelDelete { alias } => {
                let handle = self.handle(&alias)?;
                controller.delete_model(handle)?;
                self.aliases.remove(&alias);
            }
            Command::MotionAdd {
                alias,
                slot,
                location,
                arguments,
            } => {
                let handle = self.handle(&alias)?;
                let motion = self.load_motion(controller, &location)?;
                controller.add_motion(handle, &slot, motion, arguments.into())?;
            }
            Command::MotionChange {
                alias,
                slot,
                location,
            } => {
                let handle = self.handle(&alias)?;
                let motion = self.load_motion(controller, &location)?;
                controller.change_motion(handle, &slot, motion)?;
            }
            Command::MotionDelete { alias, slot } => {
                controller.delete_motion(self.handle(&alias)?, &slot)?;
            }
            Command::MotionConfigure {
                alias,
                slot,
                configuration,
            } => {
                controller.configure_motion(self.handle(&alias)?, &slot, &configuration)?;
            }
            Command::CameraMotion {
                location,
                arguments,
            } => {
                let motion = location
                    .map(|location| self.load_motion(controller, &location))
                    .transpose()?;
                controller.set_camera_motion(motion, arguments.into());
            }
            Command::LightMotion {
                location,
                arguments,
            } => {
                let motion = location
                    .map(|location| self.load_motion(controller, &location))
                    .transpose()?;
                controller.set_light_motion(motion, arguments.into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_motion_add_defaults() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let command = Command::parse("MOTION_ADD|miku|base|dance.ron")?;
        assert_eq!(
            Command::MotionAdd {
                alias: "miku".to_owned(),
                slot: "base".to_owned(),
                location: "dance.ron".to_owned(),
                arguments: MotionArguments::default(),
            },
            command
        );
        let command = Command::parse("MOTION_ADD|miku|face|blink.ron|PART|ONCE|OFF|ON|3")?;
        if let Command::MotionAdd { arguments, .. } = command {
            assert!(!arguments.full);
            assert!(arguments.once);
            assert!(!arguments.enable_smooth_transition);
            assert!(arguments.enable_re_position);
            assert_eq!(3, arguments.priority);
        } else {
            panic!("unexpected {:?}", command);
        }
        Ok(())
    }

    #[test]
    fn test_parse_configure() -> Result<(), Box<dyn std::error::Error + 'static>> {
        let command = Command::parse("MOTION_CONFIGURE|miku|face|weight=0.5|blend=ADD|once=ON")?;
        let expected = MotionConfiguration {
            blend_weight: Some(0.5f32),
            blend_mode: Some(BlendMode::Add),
            once: Some(true),
            ..Default::default()
        };
        assert_eq!(
            Command::MotionConfigure {
                alias: "miku".to_owned(),
                slot: "face".to_owned(),
                configuration: expected,
            },
            command
        );
        Ok(())
    }

    #[test]
    fn test_parse_errors() {
        for line in [
            "",
            "DANCE|miku",
            "MODEL_ADD|miku",
            "MOTION_ADD|miku|base|dance.ron|HALF",
            "MOTION_ADD|miku|base|dance.ron|FULL|LOOP|ON|OFF|high",
            "MOTION_CONFIGURE|miku|base|weight",
            "MOTION_CONFIGURE|miku|base|volume=1",
            "MOTION_DELETE|miku|",
        ] {
            let err = Command::parse(line).unwrap_err();
            assert_eq!(ErrorKind::InvalidCommand, err.kind(), "{}", line);
        }
    }

    #[test]
    fn test_parse_camera_without_location_clears() -> Result<(), Box<dyn std::error::Error + 'static>> {
        assert_eq!(
            Command::CameraMotion {
                location: None,
                arguments: MotionArguments::default(),
            },
            Command::parse("CAMERA_MOTION")?
        );
        Ok(())
    }
}
