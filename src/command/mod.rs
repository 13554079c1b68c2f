/*!
Command module.

Pure translation of a [`LaunchConfig`](crate::config::LaunchConfig) into what gets launched:
- `builder`: the command line for `Mode::Run` / `Mode::Debug`
- `manifest`: the fat-jar manifest attributes the packaging step should write

Example:
```no_run
use vertx_run::command::{self, Mode};
use vertx_run::config::LaunchConfig;

let cfg = LaunchConfig { main_module: "sample.App".into(), ..Default::default() };
let argv = command::build(&cfg, Mode::Run)?.argv();
# Ok::<(), vertx_run::Error>(())
```
*/

pub mod builder;
pub mod manifest;

pub use builder::{LaunchCommand, Mode, build};
pub use manifest::{manifest_attributes, render_manifest};
