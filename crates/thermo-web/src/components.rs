use crate::error::RenderError;
use crate::node::{Node, el};
use serde::{Deserialize, Serialize};

/// A component is a plain function from props to a node tree.
pub type Component<P> = fn(&P) -> Result<Node, RenderError>;

/// Identifier of the element the client mounts into.
pub const MOUNT_ID: &str = "thermostat";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageProps {
    pub title: String,
    pub favicon_uri: String,
    #[serde(default)]
    pub stylesheets: Vec<String>,
}

/// Document shell: head metadata and asset links around `body`.
pub fn page(props: &PageProps, body: Node) -> Node {
    let head = el("head")
        .child(el("meta").attr("charset", "utf-8"))
        .child(el("title").text(props.title.clone()))
        .child(
            el("meta")
                .attr("name", "robots")
                .attr("content", "index,follow"),
        )
        .child(
            el("link")
                .attr("rel", "icon")
                .attr("href", &props.favicon_uri)
                .attr("sizes", "16x16 32x32 48x48 64x64")
                .attr("type", "image/vnd.microsoft.icon"),
        )
        .child(
            el("meta")
                .attr("name", "viewport")
                .attr("content", "width=device-width, user-scalable=no"),
        )
        .children(props.stylesheets.iter().map(|href| {
            el("link")
                .attr("href", href)
                .attr("rel", "stylesheet")
                .attr("media", "screen")
        }));

    el("html")
        .attr("lang", "en")
        .child(head)
        .child(el("body").child(body))
        .into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Off,
    Heat,
    Cool,
    Auto,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Off, Mode::Heat, Mode::Cool, Mode::Auto];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Off => "off",
            Mode::Heat => "heat",
            Mode::Cool => "cool",
            Mode::Auto => "auto",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Mode::Off => "Off",
            Mode::Heat => "Heat",
            Mode::Cool => "Cool",
            Mode::Auto => "Auto",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    #[serde(rename = "F")]
    Fahrenheit,
    #[serde(rename = "C")]
    Celsius,
}

impl TemperatureUnit {
    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::Fahrenheit => "°F",
            TemperatureUnit::Celsius => "°C",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatProps {
    pub title: String,
    pub unit: TemperatureUnit,
    pub current: i32,
    pub target: i32,
    pub min: i32,
    pub max: i32,
    #[serde(default = "default_step")]
    pub step: i32,
    pub mode: Mode,
}

fn default_step() -> i32 {
    1
}

impl Default for ThermostatProps {
    fn default() -> Self {
        Self {
            title: "Thermostat".to_string(),
            unit: TemperatureUnit::Fahrenheit,
            current: 68,
            target: 70,
            min: 50,
            max: 90,
            step: default_step(),
            mode: Mode::Auto,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermostatAction {
    Raise,
    Lower,
    SetMode(Mode),
}

impl ThermostatAction {
    /// Maps the `data-action` / `data-mode` attributes of a control.
    pub fn from_dataset(action: &str, mode: Option<&str>) -> Option<Self> {
        match action {
            "raise" => Some(Self::Raise),
            "lower" => Some(Self::Lower),
            "mode" => mode.and_then(Mode::parse).map(Self::SetMode),
            _ => None,
        }
    }
}

impl ThermostatProps {
    /// Next props after `action`; the target never leaves `[min, max]`.
    pub fn apply(&self, action: ThermostatAction) -> Self {
        let mut next = self.clone();
        match action {
            ThermostatAction::Raise => {
                next.target = self.target.saturating_add(self.step).min(self.max)
            }
            ThermostatAction::Lower => {
                next.target = self.target.saturating_sub(self.step).max(self.min)
            }
            ThermostatAction::SetMode(mode) => next.mode = mode,
        }
        next
    }

    fn validate(&self) -> Result<(), RenderError> {
        let reason = if self.min > self.max {
            format!("min {} is above max {}", self.min, self.max)
        } else if self.step <= 0 {
            format!("step must be positive, got {}", self.step)
        } else if !(self.min..=self.max).contains(&self.target) {
            format!(
                "target {} is outside {}..={}",
                self.target, self.min, self.max
            )
        } else {
            return Ok(());
        };
        Err(RenderError::InvalidProps {
            component: "thermostat",
            reason,
        })
    }
}

/// The interactive thermostat panel, identical on server and client.
pub fn thermostat(props: &ThermostatProps) -> Result<Node, RenderError> {
    props.validate()?;
    let unit = props.unit.symbol();

    let dial = el("div")
        .class("thermostat__dial")
        .attr("role", "meter")
        .attr("aria-valuemin", props.min)
        .attr("aria-valuemax", props.max)
        .attr("aria-valuenow", props.target)
        .child(el("span").class("thermostat__target").text(props.target.to_string()))
        .child(el("span").class("thermostat__unit").text(unit));

    let controls = el("div")
        .class("thermostat__controls")
        .child(
            el("button")
                .attr("type", "button")
                .class("thermostat__button")
                .attr("data-action", "lower")
                .attr("aria-label", "Lower target temperature")
                .flag("disabled", props.target <= props.min)
                .text("\u{2212}"),
        )
        .child(
            el("button")
                .attr("type", "button")
                .class("thermostat__button")
                .attr("data-action", "raise")
                .attr("aria-label", "Raise target temperature")
                .flag("disabled", props.target >= props.max)
                .text("+"),
        );

    let modes = el("ul").class("thermostat__modes").children(Mode::ALL.map(|mode| {
        let active = mode == props.mode;
        let class_name = if active {
            "thermostat__mode thermostat__mode--active"
        } else {
            "thermostat__mode"
        };
        el("li").child(
            el("button")
                .attr("type", "button")
                .class(class_name)
                .attr("data-action", "mode")
                .attr("data-mode", mode.as_str())
                .attr("aria-pressed", active)
                .text(mode.label()),
        )
    }));

    Ok(el("section")
        .class(&format!("thermostat thermostat--{}", props.mode.as_str()))
        .attr("data-mode", props.mode.as_str())
        .child(
            el("header")
                .class("thermostat__header")
                .child(el("h1").class("thermostat__title").text(props.title.clone())),
        )
        .child(dial)
        .child(
            el("p")
                .class("thermostat__current")
                .text(format!("Currently {}{unit}", props.current)),
        )
        .child(controls)
        .child(modes)
        .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::render_to_string;

    #[test]
    fn test_page_head_has_single_title_favicon_and_viewport() {
        let props = PageProps {
            title: "APKM Thermostat".to_string(),
            favicon_uri: "/assets/media/favicon/favicon.ico".to_string(),
            stylesheets: vec!["/assets/style/screen.css".to_string()],
        };
        let html = render_to_string(&page(&props, Node::raw("<p>hi</p>")));

        assert!(html.starts_with("<html lang=\"en\"><head>"));
        assert_eq!(html.matches("<title>").count(), 1);
        assert_eq!(html.matches("rel=\"icon\"").count(), 1);
        assert_eq!(html.matches("name=\"viewport\"").count(), 1);
        assert_eq!(html.matches("rel=\"stylesheet\"").count(), 1);
        assert!(html.ends_with("<body><p>hi</p></body></html>"));
    }

    #[test]
    fn test_thermostat_renders_target_and_modes() {
        let props = ThermostatProps {
            mode: Mode::Cool,
            ..ThermostatProps::default()
        };
        let html = render_to_string(&thermostat(&props).unwrap());

        assert!(html.contains("<span class=\"thermostat__target\">70</span>"));
        assert!(html.contains("Currently 68°F"));
        assert!(html.contains("data-mode=\"cool\" aria-pressed=\"true\""));
        assert_eq!(html.matches("aria-pressed=\"false\"").count(), 3);
        assert!(!html.contains("disabled"));
    }

    #[test]
    fn test_thermostat_disables_buttons_at_bounds() {
        let props = ThermostatProps {
            target: 90,
            ..ThermostatProps::default()
        };
        let html = render_to_string(&thermostat(&props).unwrap());
        assert!(html.contains("data-action=\"raise\" aria-label=\"Raise target temperature\" disabled=\"disabled\""));
        assert_eq!(html.matches("disabled=").count(), 1);
    }

    #[test]
    fn test_thermostat_rejects_impossible_props() {
        let out_of_range = ThermostatProps {
            target: 120,
            ..ThermostatProps::default()
        };
        let bad_step = ThermostatProps {
            step: 0,
            ..ThermostatProps::default()
        };
        let inverted = ThermostatProps {
            min: 95,
            ..ThermostatProps::default()
        };

        for props in [out_of_range, bad_step, inverted] {
            assert!(matches!(
                thermostat(&props),
                Err(RenderError::InvalidProps {
                    component: "thermostat",
                    ..
                })
            ));
        }
    }

    #[test]
    fn test_apply_clamps_target() {
        let props = ThermostatProps {
            target: 89,
            step: 2,
            ..ThermostatProps::default()
        };
        assert_eq!(props.apply(ThermostatAction::Raise).target, 90);
        assert_eq!(props.apply(ThermostatAction::Lower).target, 87);

        let floor = ThermostatProps {
            target: 50,
            ..ThermostatProps::default()
        };
        assert_eq!(floor.apply(ThermostatAction::Lower).target, 50);
        assert_eq!(
            floor.apply(ThermostatAction::SetMode(Mode::Heat)).mode,
            Mode::Heat
        );
    }

    #[test]
    fn test_action_from_dataset() {
        assert_eq!(
            ThermostatAction::from_dataset("raise", None),
            Some(ThermostatAction::Raise)
        );
        assert_eq!(
            ThermostatAction::from_dataset("mode", Some("heat")),
            Some(ThermostatAction::SetMode(Mode::Heat))
        );
        assert_eq!(ThermostatAction::from_dataset("mode", Some("turbo")), None);
        assert_eq!(ThermostatAction::from_dataset("explode", None), None);
    }

    #[test]
    fn test_props_deserialize_with_default_step() {
        let props: ThermostatProps = serde_json::from_value(serde_json::json!({
            "title": "Hall",
            "unit": "C",
            "current": 20,
            "target": 21,
            "min": 10,
            "max": 30,
            "mode": "heat"
        }))
        .unwrap();
        assert_eq!(props.step, 1);
        assert_eq!(props.unit, TemperatureUnit::Celsius);
    }
}
