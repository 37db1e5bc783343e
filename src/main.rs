// src/main.rs
use iced::alignment::Horizontal;
use iced::widget::{
    button, checkbox, column, container, pick_list, row, scrollable, text, text_input, Column,
    Row, Space,
};
use iced::{executor, window, Application, Background, Color, Command, Element, Length, Settings, Theme};
use rfd::FileDialog;
use std::path::PathBuf;

mod data_types;
mod error;
mod import_flow;
mod spss;
mod tabular;
mod ui;

use data_types::{Separator, TableData};
use import_flow::{ImportFlow, ImportOptions};
use ui::{Styles, DARK_THEME, LIGHT_THEME};

pub fn main() -> iced::Result {
    let _ = tracing_subscriber::fmt().with_env_filter("info").try_init();

    DataImportApp::run(Settings {
        window: window::Settings {
            size: (1024, 768),
            resizable: true,
            ..Default::default()
        },
        ..Settings::default()
    })
}

/// Host shell: one persistent table display, plus at most one open import
/// dialog whose committed result replaces that table wholesale.
struct DataImportApp {
    is_dark_mode: bool,
    table: Option<TableData>,
    table_name: Option<String>,
    import: Option<ImportFlow>,
}

#[derive(Debug, Clone)]
enum Message {
    ToggleTheme,
    OpenImportDialog,
    SelectFile,
    FileSelected(Option<PathBuf>),
    SeparatorPicked(Separator),
    SheetPicked(String),
    SkipRowsChanged(String),
    NaMarkerChanged(String),
    TogglePreview(bool),
    RefreshPreview,
    CommitImport,
    CancelImport,
}

impl Application for DataImportApp {
    type Executor = executor::Default;
    type Message = Message;
    type Theme = Theme;
    type Flags = ();

    fn new(_flags: ()) -> (Self, Command<Message>) {
        (
            DataImportApp {
                is_dark_mode: true,
                table: None,
                table_name: None,
                import: None,
            },
            Command::none(),
        )
    }

    fn title(&self) -> String {
        match &self.table_name {
            Some(name) => format!("Data Import - {name}"),
            None => String::from("Data Import"),
        }
    }

    fn theme(&self) -> Theme {
        if self.is_dark_mode {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    fn update(&mut self, message: Message) -> Command<Message> {
        match message {
            Message::ToggleTheme => {
                self.is_dark_mode = !self.is_dark_mode;
                Command::none()
            }

            Message::OpenImportDialog => {
                if self.import.is_none() {
                    self.import = Some(ImportFlow::new());
                }
                Command::none()
            }

            Message::SelectFile => Command::perform(
                async {
                    FileDialog::new()
                        .add_filter("CSV files", &["csv"])
                        .add_filter("Excel files", &["xlsx"])
                        .add_filter("SPSS files", &["sav"])
                        .add_filter("All files", &["*"])
                        .pick_file()
                },
                Message::FileSelected,
            ),

            Message::FileSelected(path) => {
                if let Some(flow) = self.import.as_mut() {
                    flow.select_file(path);
                }
                Command::none()
            }

            Message::SeparatorPicked(separator) => {
                if let Some(flow) = self.import.as_mut() {
                    flow.set_separator(separator);
                }
                Command::none()
            }

            Message::SheetPicked(sheet) => {
                if let Some(flow) = self.import.as_mut() {
                    flow.set_sheet_name(sheet);
                }
                Command::none()
            }

            Message::SkipRowsChanged(value) => {
                if let Some(flow) = self.import.as_mut() {
                    flow.set_skip_rows(value);
                }
                Command::none()
            }

            Message::NaMarkerChanged(value) => {
                if let Some(flow) = self.import.as_mut() {
                    flow.set_na_marker(value);
                }
                Command::none()
            }

            Message::TogglePreview(show) => {
                if let Some(flow) = self.import.as_mut() {
                    flow.set_show_preview(show);
                }
                Command::none()
            }

            Message::RefreshPreview => {
                if let Some(flow) = self.import.as_mut() {
                    flow.refresh_preview();
                }
                Command::none()
            }

            Message::CommitImport => {
                if let Some(flow) = self.import.as_mut() {
                    if let Some(result) = flow.commit() {
                        tracing::info!(
                            rows = result.table.rows.len(),
                            name = result.name.as_deref().unwrap_or(""),
                            "import committed"
                        );
                        self.table = Some(result.table);
                        self.table_name = result.name;
                        self.import = None;
                    }
                }
                Command::none()
            }

            Message::CancelImport => {
                if let Some(mut flow) = self.import.take() {
                    flow.cancel();
                }
                Command::none()
            }
        }
    }

    fn view(&self) -> Element<Message> {
        let styles = self.styles();

        if let Some(flow) = &self.import {
            return self.import_dialog_view(flow, styles);
        }

        let content: Element<Message> = if let Some(ref data) = self.table {
            self.render_table(data, styles)
        } else {
            container(
                text("No data loaded. Use Load Data to import a file.")
                    .size(24)
                    .style(iced::theme::Text::Color(styles.fg))
                    .horizontal_alignment(Horizontal::Center),
            )
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x()
            .center_y()
            .into()
        };

        let footer = container(
            row![
                text("Data Import")
                    .size(14)
                    .style(iced::theme::Text::Color(styles.footer_fg)),
                Space::with_width(Length::Fill),
                button(
                    text("Load Data")
                        .size(16)
                        .style(iced::theme::Text::Color(styles.footer_fg))
                )
                .on_press(Message::OpenImportDialog)
                .style(iced::theme::Button::Custom(Box::new(ButtonStyle {
                    bg: styles.footer_bg,
                    fg: styles.footer_fg,
                    hover_bg: Color::from_rgb(0.0, 0.26, 0.5),
                }))),
                Space::with_width(Length::Fixed(10.0)),
                button(
                    text("Theme")
                        .size(16)
                        .style(iced::theme::Text::Color(styles.footer_fg))
                )
                .on_press(Message::ToggleTheme)
                .style(iced::theme::Button::Custom(Box::new(ButtonStyle {
                    bg: styles.footer_bg,
                    fg: styles.footer_fg,
                    hover_bg: Color::from_rgb(0.0, 0.26, 0.5),
                })))
            ]
            .spacing(5)
            .padding(10)
            .width(Length::Fill),
        )
        .style(iced::theme::Container::Custom(Box::new(ContainerStyle {
            bg: styles.footer_bg,
        })));

        container(column![content, footer])
            .width(Length::Fill)
            .height(Length::Fill)
            .style(iced::theme::Container::Custom(Box::new(ContainerStyle {
                bg: styles.bg,
            })))
            .into()
    }
}

impl DataImportApp {
    fn styles(&self) -> &'static Styles {
        if self.is_dark_mode {
            &DARK_THEME
        } else {
            &LIGHT_THEME
        }
    }

    fn render_table(&self, data: &TableData, styles: &Styles) -> Element<Message> {
        let headers = Row::with_children(
            data.headers
                .iter()
                .map(|header| {
                    container(
                        text(header)
                            .size(16)
                            .style(iced::theme::Text::Color(styles.header_fg)),
                    )
                    .width(Length::Fixed(120.0))
                    .padding(5)
                    .style(iced::theme::Container::Custom(Box::new(ContainerStyle {
                        bg: styles.header_bg,
                    })))
                    .into()
                })
                .collect(),
        )
        .spacing(1);

        let rows = data.rows.iter().map(|row| {
            Row::with_children(
                row.iter()
                    .map(|cell| {
                        container(
                            text(cell)
                                .size(16)
                                .style(iced::theme::Text::Color(styles.fg)),
                        )
                        .width(Length::Fixed(120.0))
                        .padding(5)
                        .into()
                    })
                    .collect(),
            )
            .spacing(1)
            .into()
        });

        scrollable(
            column![headers]
                .push(Column::with_children(rows.collect()))
                .spacing(1),
        )
        .height(Length::Fill)
        .into()
    }

    /// The import flow rendered as a modal overlay: options on the left,
    /// preview on the right, mirroring the persistent view underneath.
    fn import_dialog_view(&self, flow: &ImportFlow, styles: &Styles) -> Element<Message> {
        let mut left = column![
            text("Select Dataset")
                .size(20)
                .style(iced::theme::Text::Color(styles.fg)),
            button(text("Select File").size(16)).on_press(Message::SelectFile),
            checkbox("Show data preview", flow.show_preview(), Message::TogglePreview),
        ]
        .spacing(10)
        .width(Length::Fixed(220.0));

        if let Some(request) = flow.request() {
            let file = request
                .path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            left = left.push(
                text(file)
                    .size(14)
                    .style(iced::theme::Text::Color(styles.fg)),
            );
        }

        match flow.options() {
            Some(ImportOptions::Csv {
                separator,
                na_marker,
            }) => {
                left = left
                    .push(
                        text("Separator (CSV only):")
                            .size(14)
                            .style(iced::theme::Text::Color(styles.fg)),
                    )
                    .push(pick_list(
                        &Separator::ALL[..],
                        Some(*separator),
                        Message::SeparatorPicked,
                    ))
                    .push(
                        text("Missing values encoding:")
                            .size(14)
                            .style(iced::theme::Text::Color(styles.fg)),
                    )
                    .push(
                        text_input("Default", na_marker)
                            .on_input(Message::NaMarkerChanged)
                            .padding(6),
                    )
                    .push(button(text("Refresh Preview").size(16)).on_press(Message::RefreshPreview));
            }
            Some(ImportOptions::Excel {
                sheet_names,
                sheet_name,
                skip_rows,
                na_marker,
            }) => {
                left = left
                    .push(
                        text("Sheet:")
                            .size(14)
                            .style(iced::theme::Text::Color(styles.fg)),
                    )
                    .push(pick_list(
                        sheet_names.clone(),
                        Some(sheet_name.clone()),
                        Message::SheetPicked,
                    ))
                    .push(
                        text("Skip rows:")
                            .size(14)
                            .style(iced::theme::Text::Color(styles.fg)),
                    )
                    .push(
                        text_input("0", skip_rows)
                            .on_input(Message::SkipRowsChanged)
                            .padding(6),
                    )
                    .push(
                        text("Missing values encoding:")
                            .size(14)
                            .style(iced::theme::Text::Color(styles.fg)),
                    )
                    .push(
                        text_input("Default", na_marker)
                            .on_input(Message::NaMarkerChanged)
                            .padding(6),
                    )
                    .push(button(text("Refresh Preview").size(16)).on_press(Message::RefreshPreview));
            }
            // SPSS files have no configurable options.
            Some(ImportOptions::Spss) | None => {}
        }

        if flow.can_commit() {
            left = left.push(button(text("Import").size(16)).on_press(Message::CommitImport));
        }
        left = left.push(button(text("Cancel").size(16)).on_press(Message::CancelImport));

        if let Some(error) = flow.error() {
            left = left.push(
                text(error.to_string())
                    .size(14)
                    .style(iced::theme::Text::Color(styles.error_fg)),
            );
        }

        let preview: Element<Message> = match flow.preview() {
            Some(data) => self.render_table(data, styles),
            None => container(
                text("Data Preview")
                    .size(16)
                    .style(iced::theme::Text::Color(styles.fg)),
            )
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x()
            .center_y()
            .into(),
        };

        let dialog = container(
            row![
                left,
                container(preview).width(Length::Fill).height(Length::Fill)
            ]
            .spacing(20)
            .padding(20),
        )
        .width(Length::Fixed(900.0))
        .height(Length::Fixed(600.0))
        .style(iced::theme::Container::Custom(Box::new(ContainerStyle {
            bg: styles.dialog_bg,
        })));

        container(dialog)
            .width(Length::Fill)
            .height(Length::Fill)
            .center_x()
            .center_y()
            .style(iced::theme::Container::Custom(Box::new(OverlayStyle {})))
            .into()
    }
}

struct ContainerStyle {
    bg: Color,
}

impl container::StyleSheet for ContainerStyle {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> container::Appearance {
        container::Appearance {
            background: Some(Background::Color(self.bg)),
            ..container::Appearance::default()
        }
    }
}

struct OverlayStyle;

impl container::StyleSheet for OverlayStyle {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> container::Appearance {
        container::Appearance {
            background: Some(Background::Color(Color::from_rgba(0.0, 0.0, 0.0, 0.7))),
            ..container::Appearance::default()
        }
    }
}

struct ButtonStyle {
    bg: Color,
    fg: Color,
    hover_bg: Color,
}

impl button::StyleSheet for ButtonStyle {
    type Style = Theme;

    fn active(&self, _style: &Self::Style) -> button::Appearance {
        button::Appearance {
            background: Some(Background::Color(self.bg)),
            border_radius: 4.0.into(),
            text_color: self.fg,
            ..button::Appearance::default()
        }
    }

    fn hovered(&self, style: &Self::Style) -> button::Appearance {
        button::Appearance {
            background: Some(Background::Color(self.hover_bg)),
            ..self.active(style)
        }
    }
}
