use eframe::{egui, App};
use portwatch::{platform, Config, Inspector, ProcError, Snapshot};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ui::connection_table::ConnectionTable;
use ui::header::{Header, Tab};
use ui::process_table::ProcessTable;
use ui::status_bar::StatusBar;

mod ui;

const CONFIG_ENV: &str = "PORTWATCH_CONFIG";

#[tokio::main]
async fn main() -> eframe::Result<()> {
    let (config, config_error) = load_config();
    init_tracing(&config.log_level);
    if let Some(e) = config_error {
        warn!(error = %e, "using default configuration");
    }

    let config = Arc::new(config);
    let native_options = eframe::NativeOptions::default();
    eframe::run_native(
        "portwatch",
        native_options,
        Box::new(|cc| {
            // Global black theme
            let mut visuals = egui::Visuals::dark();
            visuals.override_text_color = Some(egui::Color32::WHITE);
            visuals.panel_fill = egui::Color32::BLACK;
            visuals.window_fill = egui::Color32::BLACK;
            cc.egui_ctx.set_visuals(visuals);

            let mut style = (*cc.egui_ctx.style()).clone();
            style.spacing.item_spacing = egui::vec2(10.0, 8.0);
            style.spacing.button_padding = egui::vec2(12.0, 8.0);
            cc.egui_ctx.set_style(style);

            Box::new(PortwatchApp::new(config))
        }),
    )
}

fn load_config() -> (Config, Option<ProcError>) {
    match std::env::var(CONFIG_ENV) {
        Ok(path) => match Config::load(&path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        },
        Err(_) => (Config::default(), None),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

struct PortwatchApp {
    config: Arc<Config>,
    snapshot: Snapshot,
    header: Header,
    process_table: ProcessTable,
    connection_table: ConnectionTable,
}

impl PortwatchApp {
    fn new(config: Arc<Config>) -> Self {
        let mut app = Self {
            process_table: ProcessTable::new(config.clone()),
            connection_table: ConnectionTable::default(),
            header: Header::default(),
            snapshot: Snapshot::default(),
            config,
        };
        // Load everything once at startup
        app.refresh();
        app
    }

    fn refresh(&mut self) {
        let inspector = Inspector::new(platform::system(), &self.config);
        self.snapshot = inspector.snapshot(self.header.state_filter);
        info!(
            processes = self.snapshot.processes.len(),
            tcp = self.snapshot.tcp.len(),
            udp = self.snapshot.udp.len(),
            "snapshot refreshed"
        );
    }
}

impl App for PortwatchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let (search_changed, refresh_requested) = self.header.show(ui);
            ui.add_space(6.0);

            if refresh_requested {
                self.refresh();
            }

            let search = &self.header.search_text;
            let shown = match self.header.tab {
                Tab::Processes => self
                    .process_table
                    .show(ui, &self.snapshot.processes, search),
                Tab::Tcp => self.connection_table.show_tcp(ui, &self.snapshot.tcp, search),
                Tab::Udp => self.connection_table.show_udp(ui, &self.snapshot.udp, search),
            };

            ui.add_space(6.0);
            StatusBar::show(ui, &self.snapshot, self.header.tab, shown);

            if search_changed {
                ctx.request_repaint();
            }
        });
    }
}
