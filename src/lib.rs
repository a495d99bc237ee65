/*!
# Configuration Grid Editor

A web-served editor core for tabular configuration files, built in Rust.

## Overview

Operators edit industry-form configuration records stored as flat CSV
files through a spreadsheet-like grid that displays the data transposed
(on-disk rows become display columns). The heart of the crate is a
bidirectional position-mapping engine that keeps three coordinate spaces
consistent — on-disk row/column, the in-memory record store, and the
filtered transposed display grid — under incremental edits, row
insertion, and visibility filtering, plus a group-sync coordinator that
propagates edits into sibling module configurations.

## Architecture

The application follows a client-server architecture:

### Core Layer
- **CSV Codec** - Quoting-aware line parser and row formatter
- **Record Store** - Ordered records with verbatim header-line round-trip
- **Position Mapping Engine** - Eager cell-mapping table with an O(1)
  reverse index from filtered display coordinates to store coordinates
- **Edit Session** - Customization tagging and CAT list bookkeeping on
  top of raw cell writes
- **Group Sync Coordinator** - Row-level and field-level propagation
  across sibling modules with per-module failure isolation

### Persistence Layer
- Org/module directory layout with timestamped backups before overwrite
- Primary + legacy-mirror fan-out with per-location receipts
- Gzip-compressed bincode snapshots for export/import

### Web Layer (feature `web`)
- axum routes for load, cell update, row add, save, codesets, and sync
- Session cache with TTL and invalidate-on-write
- Per-session fair async mutex: mutations apply strictly in arrival order

## Modules

- **record**: Record struct, field-type enum, well-known column constants
- **csv**: CSV line parsing and formatting primitives
- **store**: ConfigStore parse/serialize and derived list-type state
- **mapper**: the position-mapping engine
- **session**: edit sessions and their secondary effects
- **storage**: disk layout, backups, mirrored saves
- **codeset**: auxiliary lookup table with auto-numbered append
- **sync**: group sync coordinator
- **snapshot**: compressed binary snapshots
- **errors**: error taxonomy
- **cache**, **app**: web session cache and routing (feature `web`)

## REST API Endpoints

- `GET  /api/config` - Load the display grid for an org/module pair
- `POST /api/config/cell` - Update one display cell
- `POST /api/config/row` - Append a new field row
- `POST /api/config/save` - Persist the session to disk
- `GET  /api/config/export`, `POST /api/config/import` - Snapshots
- `GET/POST /api/codesets`, `PUT /api/codesets/:field` - Codeset table
- `POST /api/sync/rows`, `POST /api/sync/field` - Group sync
*/

pub mod codeset;
pub mod csv;
pub mod errors;
pub mod mapper;
pub mod record;
pub mod session;
pub mod snapshot;
pub mod storage;
pub mod store;
pub mod sync;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod cache;

/// Re-export the core types to make them easier to use
pub use codeset::*;
pub use errors::*;
pub use mapper::*;
pub use record::*;
pub use session::*;
pub use storage::*;
pub use store::*;
pub use sync::*;
