//! Header component with tabs, search, and the TCP state filter.

use eframe::egui;
use portwatch::ConnectionState;

#[derive(Default, PartialEq, Eq, Clone, Copy)]
pub enum Tab {
    #[default]
    Processes,
    Tcp,
    Udp,
}

#[derive(Default)]
pub struct Header {
    pub search_text: String,
    pub tab: Tab,
    pub state_filter: ConnectionState,
}

impl Header {
    pub fn show(&mut self, ui: &mut egui::Ui) -> (bool, bool) {
        // Returns (search_changed, refresh_requested)
        let mut search_changed = false;
        let mut refresh_requested = false;

        ui.horizontal(|ui| {
            ui.heading("portwatch");

            ui.add_space(20.0);
            ui.selectable_value(&mut self.tab, Tab::Processes, "Processes");
            ui.selectable_value(&mut self.tab, Tab::Tcp, "TCP");
            ui.selectable_value(&mut self.tab, Tab::Udp, "UDP");

            ui.add_space(20.0);
            ui.label("Search:");
            let response = ui.add(
                egui::TextEdit::singleline(&mut self.search_text)
                    .hint_text("Name or PID...")
                    .desired_width(200.0),
            );
            if response.changed() {
                search_changed = true;
            }

            if !self.search_text.is_empty() && ui.button("Clear").clicked() {
                self.search_text.clear();
                search_changed = true;
            }

            // The state filter is applied by the TCP table query itself
            if self.tab == Tab::Tcp {
                ui.add_space(10.0);
                egui::ComboBox::from_label("State")
                    .selected_text(self.state_filter.label())
                    .show_ui(ui, |ui| {
                        for state in ConnectionState::ALL {
                            if ui
                                .selectable_value(&mut self.state_filter, state, state.label())
                                .changed()
                            {
                                refresh_requested = true;
                            }
                        }
                    });
            }

            ui.add_space(10.0);
            if ui
                .button("Refresh")
                .on_hover_text("Take a new snapshot of processes and sockets.")
                .clicked()
            {
                refresh_requested = true;
            }
        });

        (search_changed, refresh_requested)
    }
}
