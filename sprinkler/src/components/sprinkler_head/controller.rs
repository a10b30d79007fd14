use crate::components::sprinkler_head::{
    actuating::sequencer::{CommandSequencer, DispatchError, RunState},
    planning::{
        geometry::{GeometryEngine, Position},
        registry::{Category, Dwell, DwellError, Point, PointRegistry},
    },
    reporting::session::{self, ReportError},
};
use crate::devices::hardware::serial::{LineTransport, SerialConfig};
use crate::messages::control::action::ActionMessage;
use crate::utils::time::Timestamp;
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use uuid::Uuid;

/// Where a saved run is written when the config does not say.
pub const DEFAULT_EXPORT_PATH: &str = "output.csv";

/// Configuration could not be loaded.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not locate the config file {0:?}")]
    Missing(PathBuf),
    #[error("failed to read config")]
    Read(#[from] config::ConfigError),
}

/// Failures applying an operator action.
#[derive(Error, Debug)]
pub enum ControllerError {
    /// A run is in flight and the action would change what it is
    /// working through.
    #[error("sprinkler head is running, {0:?} refused")]
    Busy(ActionMessage),
    #[error("dwell for {category} refused")]
    InvalidDuration {
        category: Category,
        #[source]
        source: DwellError,
    },
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error("failed to read operator input")]
    Input(#[from] std::io::Error),
}

/// Dwell text entered for each category. The operator can change
/// these at any time, new targets pick up the value current when they
/// are placed.
#[derive(Deserialize, Serialize, Clone, PartialEq, Eq, Debug)]
pub struct CategoryDurations {
    pub tree_1: String,
    pub tree_2: String,
    pub tree_3: String,
}

impl Default for CategoryDurations {
    fn default() -> Self {
        Self {
            tree_1: String::from("3"),
            tree_2: String::from("6"),
            tree_3: String::from("9"),
        }
    }
}

impl CategoryDurations {
    pub fn get(&self, category: Category) -> Dwell {
        Dwell::new(self.slot(category).as_str())
    }

    pub fn set(&mut self, category: Category, duration: impl Into<String>) {
        *self.slot_mut(category) = Dwell::new(duration).as_str().to_string();
    }

    fn slot(&self, category: Category) -> &String {
        match category {
            Category::Tree1 => &self.tree_1,
            Category::Tree2 => &self.tree_2,
            Category::Tree3 => &self.tree_3,
        }
    }

    fn slot_mut(&mut self, category: Category) -> &mut String {
        match category {
            Category::Tree1 => &mut self.tree_1,
            Category::Tree2 => &mut self.tree_2,
            Category::Tree3 => &mut self.tree_3,
        }
    }
}

fn default_export_path() -> PathBuf {
    PathBuf::from(DEFAULT_EXPORT_PATH)
}

/// Set the configuration for the sprinkler head component: where the
/// head sits on the plan, how far it reaches and how to talk to it.
#[derive(Deserialize, Serialize, PartialEq, Debug, Clone)]
pub struct SprinklerHeadConfig {
    /// Location of the head on the plan.
    origin: Position,
    /// Furthest distance the head can water, in plan units.
    reach_radius: f64,
    /// Serial port of the servo controller.
    serial: SerialConfig,
    /// Starting dwell text for each category.
    #[serde(default)]
    category_durations: CategoryDurations,
    /// File a saved run is written to.
    #[serde(default = "default_export_path")]
    export_path: PathBuf,
}

impl SprinklerHeadConfig {
    /// Sprinkler head configuration with default dwell times and
    /// export path.
    ///
    /// * `origin`: location of the head on the plan.
    /// * `reach_radius`: furthest reachable distance.
    /// * `serial`: port settings for the servo controller.
    pub fn new(origin: Position, reach_radius: f64, serial: SerialConfig) -> Self {
        Self {
            origin,
            reach_radius,
            serial,
            category_durations: CategoryDurations::default(),
            export_path: default_export_path(),
        }
    }

    /// Override the starting dwell of one category.
    pub fn with_duration(mut self, category: Category, duration: impl Into<String>) -> Self {
        self.category_durations.set(category, duration);
        self
    }

    pub fn with_export_path<F: AsRef<OsStr>>(mut self, filepath: F) -> Self {
        self.export_path = (&filepath).into();
        self
    }

    pub fn serial(&self) -> &SerialConfig {
        &self.serial
    }

    pub fn export_path(&self) -> &Path {
        &self.export_path
    }

    /// Build the config by reading a yaml file.
    ///
    /// * `filepath`: path to config.
    pub fn from_file<F: AsRef<OsStr>>(filepath: F) -> Result<Self, ConfigError> {
        let file = Path::new(&filepath);
        if !file.is_file() {
            return Err(ConfigError::Missing(file.to_path_buf()));
        }
        let config_file = config::Config::builder()
            .add_source(config::File::new(
                &file.to_string_lossy(),
                config::FileFormat::Yaml,
            ))
            .build()?;

        Ok(config_file.try_deserialize::<SprinklerHeadConfig>()?)
    }
}

/// Result of applying one operator action.
#[derive(Debug, PartialEq)]
pub enum Outcome {
    Added(Point),
    Undone(Option<Point>),
    Dispatched(usize),
    Reset(Timestamp),
    Saved { path: PathBuf, records: usize },
    Selected(Category),
    DurationSet { category: Category, duration: Dwell },
    Table(String),
}

/// Component that owns a run: the placed targets, the head it drives
/// and the dwell settings used for new targets.
pub struct SprinklerHead<T> {
    /// Unique identifier, helpful for trouble shooting and logging.
    uuid: Uuid,
    registry: PointRegistry,
    sequencer: CommandSequencer,
    transport: T,
    selected: Category,
    durations: CategoryDurations,
    export_path: PathBuf,
}

impl<T: LineTransport> SprinklerHead<T> {
    /// Create the component from a config and an already open transport.
    pub fn new(config: SprinklerHeadConfig, transport: T) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            registry: PointRegistry::new(GeometryEngine::new(
                config.origin,
                config.reach_radius,
            )),
            sequencer: CommandSequencer::new(),
            transport,
            selected: Category::default(),
            durations: config.category_durations,
            export_path: config.export_path,
        }
    }

    pub fn get_uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn registry(&self) -> &PointRegistry {
        &self.registry
    }

    /// Handle on the run state shared with any in-flight run.
    pub fn sequencer(&self) -> &CommandSequencer {
        &self.sequencer
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn selected(&self) -> Category {
        self.selected
    }

    /// Apply one operator action. Actions that change the targets or
    /// drive the head are refused while a run is in flight.
    pub async fn apply(&mut self, action: ActionMessage) -> Result<Outcome, ControllerError> {
        if action.is_mutating() && self.sequencer.state() == RunState::Running {
            tracing::warn!(uuid = %self.uuid, ?action, "refused while running");
            return Err(ControllerError::Busy(action));
        }

        match action {
            ActionMessage::Add { x, y } => {
                let point = self.registry.add(
                    Position::new(x, y),
                    self.selected,
                    self.durations.get(self.selected),
                    Timestamp::now(),
                );
                if point.out_of_range {
                    tracing::warn!(
                        index = point.index,
                        distance = point.distance,
                        "target is beyond the reach of the head"
                    );
                }
                tracing::info!(
                    index = point.index,
                    category = %point.category,
                    degree_right = point.degree_right,
                    "target added"
                );
                self.log_table();
                Ok(Outcome::Added(point))
            }
            ActionMessage::Undo => {
                let undone = self.registry.undo_last();
                match &undone {
                    Some(point) => tracing::info!(index = point.index, "target removed"),
                    None => tracing::info!("nothing to undo"),
                }
                self.log_table();
                Ok(Outcome::Undone(undone))
            }
            ActionMessage::Run => {
                let commands = CommandSequencer::build(self.registry.snapshot())?;
                let sent = self
                    .sequencer
                    .dispatch(&commands, &mut self.transport)
                    .await?;
                Ok(Outcome::Dispatched(sent))
            }
            ActionMessage::Reset => {
                let now = Timestamp::now();
                self.registry.reset(now);
                tracing::info!(run_time = %now, "new run started");
                Ok(Outcome::Reset(now))
            }
            ActionMessage::Save => {
                let records = session::save(self.registry.snapshot(), &self.export_path)?;
                tracing::info!(records, path = ?self.export_path, "run saved");
                Ok(Outcome::Saved {
                    path: self.export_path.clone(),
                    records,
                })
            }
            ActionMessage::Select { category } => {
                self.selected = category;
                tracing::info!(%category, "category selected");
                Ok(Outcome::Selected(category))
            }
            ActionMessage::SetDuration { category, duration } => {
                if let Err(source) = Dwell::new(duration.as_str()).seconds() {
                    tracing::warn!(%category, error = %source, "dwell not changed");
                    return Err(ControllerError::InvalidDuration { category, source });
                }
                self.durations.set(category, duration);
                let duration = self.durations.get(category);
                tracing::info!(%category, %duration, "dwell changed");
                Ok(Outcome::DurationSet { category, duration })
            }
            ActionMessage::Show => Ok(Outcome::Table(session::render_table(
                self.registry.snapshot(),
            )?)),
        }
    }

    fn log_table(&self) {
        match session::render_table(self.registry.snapshot()) {
            Ok(table) => tracing::debug!("\n{table}"),
            Err(e) => tracing::warn!(error = %e, "session table unavailable"),
        }
    }
}

/// Unit struct for adding controlling behaviour to the sprinkler head.
pub struct SprinklerHeadController;

impl SprinklerHeadController {
    /// Read operator actions, one JSON object per line, and apply them
    /// until the input ends. Malformed lines and failed actions are
    /// logged and the loop carries on; a failed read ends it.
    ///
    /// * `head`: component to drive.
    /// * `input`: buffered operator input, such as stdin.
    pub async fn start<T, R>(head: &mut SprinklerHead<T>, mut input: R) -> Result<(), ControllerError>
    where
        T: LineTransport,
        R: AsyncBufRead + Unpin,
    {
        tracing::info!(uuid = %head.get_uuid(), "sprinkler head ready");
        let mut data = Vec::new();

        loop {
            data.clear();
            let bytes_read = input.read_until(b'\n', &mut data).await?;
            if bytes_read == 0 {
                tracing::info!("operator input closed");
                return Ok(());
            }
            if data.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            match serde_json::from_slice::<ActionMessage>(&data) {
                Ok(action) => match head.apply(action).await {
                    Ok(Outcome::Table(table)) => println!("{table}"),
                    Ok(outcome) => tracing::debug!(?outcome, "action applied"),
                    Err(e) => tracing::error!(error = %e, "action failed"),
                },
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        data = %String::from_utf8_lossy(&data).trim_end(),
                        "Received a malformed request"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::devices::software::recording::RecordingTransport;
    use rstest::rstest;
    use serial_test::serial;
    use std::fs::OpenOptions;

    fn config() -> SprinklerHeadConfig {
        SprinklerHeadConfig::new(
            Position::new(400.0, 595.0),
            400.0,
            SerialConfig::new("/dev/ttyUSB0"),
        )
    }

    fn head() -> SprinklerHead<RecordingTransport> {
        SprinklerHead::new(config(), RecordingTransport::new())
    }

    async fn add(head: &mut SprinklerHead<RecordingTransport>, x: f64, y: f64) -> Point {
        match head.apply(ActionMessage::Add { x, y }).await.unwrap() {
            Outcome::Added(point) => point,
            other => panic!("expected a point, got {other:?}"),
        }
    }

    #[test]
    fn test_default_durations() {
        let durations = CategoryDurations::default();
        assert_eq!(durations.get(Category::Tree1), Dwell::from("3"));
        assert_eq!(durations.get(Category::Tree2), Dwell::from("6"));
        assert_eq!(durations.get(Category::Tree3), Dwell::from("9"));
    }

    #[tokio::test]
    async fn test_add_uses_selected_category_duration() {
        let mut head = head();
        let first = add(&mut head, 400.0, 195.0).await;
        assert_eq!(first.category, Category::Tree1);
        assert_eq!(first.duration, Dwell::from("3"));

        head.apply(ActionMessage::Select {
            category: Category::Tree3,
        })
        .await
        .unwrap();
        head.apply(ActionMessage::SetDuration {
            category: Category::Tree3,
            duration: String::from("12"),
        })
        .await
        .unwrap();
        let second = add(&mut head, 800.0, 595.0).await;
        assert_eq!(second.index, 1);
        assert_eq!(second.category, Category::Tree3);
        assert_eq!(second.duration, Dwell::from("12"));

        // Changing the dwell later does not touch placed targets.
        head.apply(ActionMessage::SetDuration {
            category: Category::Tree3,
            duration: String::from("1"),
        })
        .await
        .unwrap();
        assert_eq!(head.registry().snapshot()[1].duration, Dwell::from("12"));
    }

    #[tokio::test]
    async fn test_run_sends_sorted_commands() {
        let mut head = head();
        add(&mut head, 400.0, 195.0).await;
        add(&mut head, 800.0, 595.0).await;

        let outcome = head.apply(ActionMessage::Run).await.unwrap();
        assert_eq!(outcome, Outcome::Dispatched(4));
        assert_eq!(
            head.transport().lines(),
            ["0,3\n", "0,0\n", "90,3\n", "0,0\n"]
        );
        // Running does not consume the targets.
        assert_eq!(head.registry().len(), 2);
    }

    #[tokio::test]
    async fn test_run_on_empty_sends_nothing() {
        let mut head = head();
        assert_eq!(
            head.apply(ActionMessage::Run).await.unwrap(),
            Outcome::Dispatched(0)
        );
        assert!(head.transport().lines().is_empty());
    }

    #[tokio::test]
    async fn test_failed_run_is_surfaced() {
        let mut head = SprinklerHead::new(config(), RecordingTransport::failing_after(1));
        add(&mut head, 400.0, 195.0).await;

        let result = head.apply(ActionMessage::Run).await;
        assert!(matches!(
            result,
            Err(ControllerError::Dispatch(DispatchError::Transport { sent: 1, .. }))
        ));
        assert_eq!(head.sequencer().state(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_mutations_refused_while_running() {
        let mut head = head();
        add(&mut head, 400.0, 195.0).await;
        let ticket = head.sequencer().try_begin().unwrap();

        for action in [
            ActionMessage::Add { x: 1.0, y: 1.0 },
            ActionMessage::Undo,
            ActionMessage::Run,
            ActionMessage::Reset,
        ] {
            assert!(matches!(
                head.apply(action).await,
                Err(ControllerError::Busy(_))
            ));
        }
        assert_eq!(head.registry().len(), 1);
        assert!(head.transport().lines().is_empty());

        assert!(matches!(
            head.apply(ActionMessage::Show).await,
            Ok(Outcome::Table(_))
        ));

        drop(ticket);
        assert!(matches!(
            head.apply(ActionMessage::Undo).await,
            Ok(Outcome::Undone(Some(_)))
        ));
    }

    #[tokio::test]
    async fn test_undo_and_reset() {
        let mut head = head();
        add(&mut head, 100.0, 100.0).await;
        add(&mut head, 200.0, 100.0).await;

        assert!(matches!(
            head.apply(ActionMessage::Undo).await.unwrap(),
            Outcome::Undone(Some(Point { index: 1, .. }))
        ));
        head.apply(ActionMessage::Reset).await.unwrap();
        assert!(head.registry().is_empty());
        assert_eq!(
            head.apply(ActionMessage::Undo).await.unwrap(),
            Outcome::Undone(None)
        );
        let point = add(&mut head, 300.0, 100.0).await;
        assert_eq!(point.index, 0);
        assert_eq!(Some(point.run_time), head.registry().run_start());
    }

    #[rstest]
    #[case("soon")]
    #[case("3\n180,600")]
    #[case("3,0")]
    #[case("-1")]
    #[tokio::test]
    async fn test_set_duration_refuses_unreadable_dwell(#[case] duration: &str) {
        let mut head = head();
        assert!(matches!(
            head.apply(ActionMessage::SetDuration {
                category: Category::Tree1,
                duration: String::from(duration),
            })
            .await,
            Err(ControllerError::InvalidDuration {
                category: Category::Tree1,
                ..
            })
        ));
        let point = add(&mut head, 400.0, 195.0).await;
        assert_eq!(point.duration, Dwell::from("3"));

        head.apply(ActionMessage::Run).await.unwrap();
        assert_eq!(head.transport().lines(), ["90,3\n", "0,0\n"]);
    }

    #[tokio::test]
    async fn test_set_duration_stores_trimmed_dwell() {
        let mut head = head();
        assert_eq!(
            head.apply(ActionMessage::SetDuration {
                category: Category::Tree2,
                duration: String::from(" 2 "),
            })
            .await
            .unwrap(),
            Outcome::DurationSet {
                category: Category::Tree2,
                duration: Dwell::from("2"),
            }
        );
        head.apply(ActionMessage::Select {
            category: Category::Tree2,
        })
        .await
        .unwrap();
        add(&mut head, 400.0, 195.0).await;

        head.apply(ActionMessage::Run).await.unwrap();
        assert_eq!(head.transport().lines(), ["90,2\n", "0,0\n"]);
        let records = session::export_record(head.registry().snapshot()).unwrap();
        assert_eq!(records[0].duration, "2");
    }

    #[tokio::test]
    async fn test_configured_bad_dwell_never_reaches_transport() {
        let mut head = SprinklerHead::new(
            config().with_duration(Category::Tree1, "3\n180,600"),
            RecordingTransport::new(),
        );
        add(&mut head, 400.0, 195.0).await;

        assert!(matches!(
            head.apply(ActionMessage::Run).await,
            Err(ControllerError::Dispatch(DispatchError::InvalidDuration { index: 0, .. }))
        ));
        assert!(head.transport().lines().is_empty());
        assert_eq!(head.sequencer().state(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_show_fails_on_bad_duration() {
        let mut head = SprinklerHead::new(
            config().with_duration(Category::Tree1, "soon"),
            RecordingTransport::new(),
        );
        add(&mut head, 400.0, 195.0).await;

        assert!(matches!(
            head.apply(ActionMessage::Show).await,
            Err(ControllerError::Report(ReportError::InvalidDuration { index: 0, .. }))
        ));
    }

    #[tokio::test]
    #[serial]
    async fn test_save_writes_export_path() {
        let path = crate::test_output_path!("/config/controller_export.csv");
        let mut head = SprinklerHead::new(
            config().with_export_path(path),
            RecordingTransport::new(),
        );
        add(&mut head, 400.0, 195.0).await;

        assert_eq!(
            head.apply(ActionMessage::Save).await.unwrap(),
            Outcome::Saved {
                path: PathBuf::from(path),
                records: 1
            }
        );
        let text = std::fs::read_to_string(path).unwrap();
        assert_eq!(text.lines().count(), 2);
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn test_start_applies_lines_and_skips_malformed() {
        let mut head = head();
        let input: &[u8] = b"{\"action\": \"add\", \"x\": 400, \"y\": 195}\n\
            not json\n\
            \n\
            {\"action\": \"select\", \"category\": \"tree_2\"}\n\
            {\"action\": \"add\", \"x\": 800, \"y\": 595}\n\
            {\"action\": \"undo\"}\n\
            {\"action\": \"run\"}";

        SprinklerHeadController::start(&mut head, input).await.unwrap();

        assert_eq!(head.registry().len(), 1);
        assert_eq!(head.selected(), Category::Tree2);
        assert_eq!(head.transport().lines(), ["90,3\n", "0,0\n"]);
    }

    #[test]
    fn test_missing_config_file() {
        assert!(matches!(
            SprinklerHeadConfig::from_file("/no/such/sprinkler_head.yaml"),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn test_checked_in_config_parses() {
        let config = SprinklerHeadConfig::from_file(crate::test_file_path!(
            "/config/components/sprinkler_head/sprinkler_head.yaml"
        ))
        .unwrap();
        assert_eq!(config.origin, Position::new(400.0, 595.0));
        assert_eq!(config.reach_radius, 400.0);
        assert_eq!(config.serial().baud_rate, 115_200);
        assert_eq!(config.category_durations, CategoryDurations::default());
        assert_eq!(config.export_path(), Path::new("output.csv"));
    }

    #[test]
    #[serial]
    fn test_read_write_component_config_to_file() {
        let path = crate::test_output_path!(
            "/config/components/sprinkler_head/sprinkler_head_test.yaml"
        );
        let write_config = SprinklerHeadConfig::new(
            Position::new(250.0, 480.0),
            350.0,
            SerialConfig::new("/dev/ttyACM0").with_baud_rate(9600),
        )
        .with_duration(Category::Tree2, "7.5")
        .with_export_path("/var/lib/sprinkler/runs.csv");

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .expect("Failed to open file");
        serde_yaml::to_writer(file, &write_config).expect("Failed to write yaml");

        let read_config = SprinklerHeadConfig::from_file(path).unwrap();
        assert_eq!(write_config, read_config, "Failed to read write config");
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_defaults_fill_optional_fields() {
        let config: SprinklerHeadConfig = serde_yaml::from_str(
            "origin: {x: 10.0, y: 20.0}\nreach_radius: 5.0\nserial: {port_name: COM5}\n",
        )
        .unwrap();
        assert_eq!(
            config,
            SprinklerHeadConfig::new(Position::new(10.0, 20.0), 5.0, SerialConfig::new("COM5"))
        );
    }
}
