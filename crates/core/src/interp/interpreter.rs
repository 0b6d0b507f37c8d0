//! Content-stream interpreter.
//!
//! [`PageInterpreter`] walks the statements of a content stream, keeps the
//! graphics state stack and the current path, and turns paint operators into
//! [`DrawingSurface`] calls. Operator handlers live in `interp::ops`, one
//! `impl` block per operator category; this file holds the interpreter
//! state, dispatch and the compatibility / marked-content operators.
//!
//! Errors follow two classes. Structural errors (malformed operator
//! sequences, missing color spaces or XObjects, invalid definitions) abort
//! interpretation. Errors for which [`RenderError::is_recoverable`] holds
//! only lose the paint that raised them: they are logged and execution
//! continues with the next statement.

use crate::error::{RenderError, Result};
use crate::interp::cache::ResourceManager;
use crate::interp::device::DrawingSurface;
use crate::interp::ops::Args;
use crate::interp::options::RenderOptions;
use crate::interp::resources::{ResourceResolver, ResourceScopes, category};
use crate::model::objects::{PDFDict, PDFObject};
use crate::model::path::{ClipPath, FillRule, Path};
use crate::model::state::GraphicsState;
use crate::parser::content::{ContentParser, Operation, Statement};
use crate::parser::lexer::Keyword;
use crate::utils::{MATRIX_IDENTITY, Matrix, Rect};
use std::sync::Arc;

/// Content-stream interpreter for one page (or one pattern cell).
///
/// Method names like `do_Q`, `do_S`, `do_B` use uppercase to match the
/// operator they implement.
pub struct PageInterpreter<'a, D: DrawingSurface + ?Sized> {
    pub(crate) resolver: &'a dyn ResourceResolver,
    /// Caches and collaborators shared with nested interpreters
    pub(crate) resources: &'a mut ResourceManager,
    pub(crate) device: &'a mut D,
    pub(crate) options: &'a RenderOptions,
    pub(crate) scopes: ResourceScopes,
    pub(crate) gstate: GraphicsState,
    pub(crate) gstack: Vec<GraphicsState>,
    /// `Q` never pops below this depth (the entry depth of a form).
    pub(crate) stack_floor: usize,
    pub(crate) path: Path,
    /// Clip requested by `W`/`W*`, applied by the next paint or `n`.
    pub(crate) pending_clip: Option<FillRule>,
    /// ctm of the default space of the current content stream. Pattern
    /// matrices are relative to it.
    pub(crate) base_ctm: Matrix,
    /// ctm last sent with `set_transform`
    pub(crate) device_ctm: Option<Matrix>,
    /// Open `BX` sections
    pub(crate) compat_depth: usize,
    /// Open `BMC`/`BDC` sections
    pub(crate) marked_depth: usize,
    /// Forms and pattern cells being interpreted, outermost first.
    pub(crate) form_stack: Vec<PDFObject>,
    /// Color operators are ignored (cells of uncolored tiling patterns).
    pub(crate) lock_colors: bool,
}

/// Standard page ctm for a media box and `/Rotate` value, in a y-up
/// device space whose origin is the lower-left corner of the page.
pub fn page_ctm(mediabox: Rect, rotate: i64) -> Matrix {
    let (x0, y0, x1, y1) = mediabox;
    match rotate.rem_euclid(360) {
        90 => (0.0, -1.0, 1.0, 0.0, -y0, x1),
        180 => (-1.0, 0.0, 0.0, -1.0, x1, y1),
        270 => (0.0, 1.0, -1.0, 0.0, y1, -x0),
        _ => (1.0, 0.0, 0.0, 1.0, -x0, -y0),
    }
}

#[allow(non_snake_case)]
impl<'a, D: DrawingSurface + ?Sized> PageInterpreter<'a, D> {
    /// Create an interpreter with an empty resource scope and identity ctm.
    pub fn new(
        resolver: &'a dyn ResourceResolver,
        resources: &'a mut ResourceManager,
        device: &'a mut D,
        options: &'a RenderOptions,
    ) -> Self {
        Self {
            resolver,
            resources,
            device,
            options,
            scopes: ResourceScopes::new(PDFDict::new()),
            gstate: GraphicsState::new(MATRIX_IDENTITY),
            gstack: Vec::new(),
            stack_floor: 0,
            path: Path::new(),
            pending_clip: None,
            base_ctm: MATRIX_IDENTITY,
            device_ctm: None,
            compat_depth: 0,
            marked_depth: 0,
            form_stack: Vec::new(),
            lock_colors: false,
        }
    }

    /// Set the page's `/Resources` dictionary.
    pub fn init_resources(&mut self, page_resources: PDFDict) {
        self.scopes = ResourceScopes::new(page_resources);
    }

    /// Reset the graphics state with `ctm` as the page ctm.
    pub fn init_state(&mut self, ctm: Matrix) {
        self.gstate = GraphicsState::new(ctm);
        self.gstack.clear();
        self.stack_floor = 0;
        self.path = Path::new();
        self.pending_clip = None;
        self.base_ctm = ctm;
        self.device_ctm = None;
        self.compat_depth = 0;
    }

    /// Interpret a page: reset state and resources, then execute `content`.
    pub fn render_page(
        &mut self,
        content: &[u8],
        page_resources: PDFDict,
        ctm: Matrix,
    ) -> Result<()> {
        self.init_resources(page_resources);
        self.init_state(ctm);
        self.execute(content)
    }

    pub const fn gstate(&self) -> &GraphicsState {
        &self.gstate
    }

    pub const fn ctm(&self) -> Matrix {
        self.gstate.ctm
    }

    /// The path under construction.
    pub const fn current_path(&self) -> &Path {
        &self.path
    }

    /// Number of saved states (`q` without matching `Q`).
    pub fn stack_depth(&self) -> usize {
        self.gstack.len()
    }

    // ========================================================================
    // Execution
    // ========================================================================

    /// Execute one content stream.
    ///
    /// States saved by unbalanced `q` operators are dropped at the end of
    /// the stream and open marked-content sections are closed.
    pub fn execute(&mut self, content: &[u8]) -> Result<()> {
        let floor = self.gstack.len();
        let marked = self.marked_depth;
        let result = self.execute_statements(content);
        self.restore_to(floor);
        while self.marked_depth > marked {
            self.marked_depth -= 1;
            self.device.end_marked();
        }
        result
    }

    fn execute_statements(&mut self, content: &[u8]) -> Result<()> {
        for statement in ContentParser::new(content) {
            match statement? {
                Statement::Operation(op) => self.run_operation(&op)?,
                Statement::InlineImage(image) => {
                    tracing::trace!(range = ?image.range, "inline image");
                    let result = self.do_inline_image(&image);
                    self.recover(&Keyword::BI, result)?;
                }
            }
        }
        Ok(())
    }

    fn run_operation(&mut self, op: &Operation) -> Result<()> {
        let arity = op.operator.arity();
        if !arity.accepts(op.operands.len()) {
            let err = RenderError::malformed(
                op.operator.as_str(),
                format!("expected {arity} operands, found {}", op.operands.len()),
            );
            return self.recover(&op.operator, Err(err));
        }
        tracing::trace!(op = %op.operator.as_str(), operands = op.operands.len(), "dispatch");
        let result = self.dispatch_operator(&op.operator, &Args::new(&op.operator, &op.operands));
        self.recover(&op.operator, result)
    }

    /// Downgrade recoverable errors to warnings.
    ///
    /// With `strict_operands` off, malformed operator sequences are skipped
    /// as well.
    pub(crate) fn recover(&self, op: &Keyword, result: Result<()>) -> Result<()> {
        match result {
            Err(err)
                if err.is_recoverable()
                    || (!self.options.strict_operands
                        && matches!(err, RenderError::MalformedOperatorSequence { .. })) =>
            {
                tracing::warn!(op = %op.as_str(), error = %err, "skipping operator");
                Ok(())
            }
            other => other,
        }
    }

    fn dispatch_operator(&mut self, op: &Keyword, args: &Args<'_>) -> Result<()> {
        match op {
            // Graphics state
            Keyword::Qq => self.do_q(),
            Keyword::Q => self.do_Q(),
            Keyword::Cm => self.do_cm(args.matrix()?),
            Keyword::Ww => self.do_w(args.num(0)?),
            Keyword::J => self.do_J(args.int(0)?),
            Keyword::Jj => self.do_j(args.int(0)?),
            Keyword::M => self.do_M(args.num(0)?),
            Keyword::D => return self.do_d(args.num_array(0)?, args.num(1)?),
            Keyword::Ri => self.do_ri(args.name(0)?),
            Keyword::I => self.do_i(args.num(0)?),
            Keyword::Gs => return self.do_gs(args.name(0)?),

            // Path construction
            Keyword::Mm => self.do_m(args.num(0)?, args.num(1)?),
            Keyword::L => self.do_l(args.num(0)?, args.num(1)?),
            Keyword::C => self.do_c(
                args.num(0)?,
                args.num(1)?,
                args.num(2)?,
                args.num(3)?,
                args.num(4)?,
                args.num(5)?,
            ),
            Keyword::V => self.do_v(args.num(0)?, args.num(1)?, args.num(2)?, args.num(3)?),
            Keyword::Y => self.do_y(args.num(0)?, args.num(1)?, args.num(2)?, args.num(3)?),
            Keyword::H => self.do_h(),
            Keyword::Re => self.do_re(args.num(0)?, args.num(1)?, args.num(2)?, args.num(3)?),

            // Path painting
            Keyword::S => return self.do_S(),
            Keyword::Ss => return self.do_s(),
            Keyword::Ff | Keyword::F => return self.do_f(),
            Keyword::FStar => return self.do_f_star(),
            Keyword::B => return self.do_B(),
            Keyword::BStar => return self.do_B_star(),
            Keyword::Bb => return self.do_b(),
            Keyword::BbStar => return self.do_b_star(),
            Keyword::N => self.do_n(),
            Keyword::WClip => self.do_W(),
            Keyword::WStar => self.do_W_star(),

            // Color
            Keyword::CS => return self.do_CS(args.name(0)?),
            Keyword::Cs => return self.do_cs(args.name(0)?),
            Keyword::SC => return self.do_SC(args),
            Keyword::Sc => return self.do_sc(args),
            Keyword::SCN => return self.do_SCN(args),
            Keyword::Scn => return self.do_scn(args),
            Keyword::G => return self.do_G(args.num(0)?),
            Keyword::Gg => return self.do_g(args.num(0)?),
            Keyword::RG => return self.do_RG(args.num(0)?, args.num(1)?, args.num(2)?),
            Keyword::Rg => return self.do_rg(args.num(0)?, args.num(1)?, args.num(2)?),
            Keyword::K => {
                return self.do_K(args.num(0)?, args.num(1)?, args.num(2)?, args.num(3)?);
            }
            Keyword::Kk => {
                return self.do_k(args.num(0)?, args.num(1)?, args.num(2)?, args.num(3)?);
            }

            // Text
            Keyword::BT => self.do_BT(),
            Keyword::ET => self.do_ET(),
            Keyword::Tc => self.do_Tc(args.num(0)?),
            Keyword::Tw => self.do_Tw(args.num(0)?),
            Keyword::Tz => self.do_Tz(args.num(0)?),
            Keyword::TL => self.do_TL(args.num(0)?),
            Keyword::Tf => return self.do_Tf(args.name(0)?, args.num(1)?),
            Keyword::Tr => self.do_Tr(args.int(0)?),
            Keyword::Ts => self.do_Ts(args.num(0)?),
            Keyword::Td => self.do_Td(args.num(0)?, args.num(1)?),
            Keyword::TD => self.do_TD(args.num(0)?, args.num(1)?),
            Keyword::Tm => self.do_Tm(args.matrix()?),
            Keyword::TStar => self.do_T_star(),
            Keyword::Tj => return self.do_Tj(args.string(0)?),
            Keyword::TJ => return self.do_TJ(args.array(0)?),
            Keyword::Quote => return self.do_quote(args.string(0)?),
            Keyword::DoubleQuote => {
                return self.do_double_quote(args.num(0)?, args.num(1)?, args.string(2)?);
            }
            Keyword::D0 | Keyword::D1 => {
                tracing::debug!(op = %op.as_str(), "glyph metrics outside a Type3 glyph procedure");
            }

            // XObjects and shadings
            Keyword::Do => return self.do_Do(args.name(0)?),
            Keyword::Sh => return self.do_sh(args.name(0)?),
            Keyword::BI | Keyword::ID | Keyword::EI => {
                tracing::warn!(op = %op.as_str(), "stray inline image operator");
            }

            // Marked content
            Keyword::BMC => self.do_BMC(args.name(0)?),
            Keyword::BDC => return self.do_BDC(args.name(0)?, args.get(1)),
            Keyword::EMC => self.do_EMC(),
            Keyword::MP | Keyword::DP => {
                let tag = args.name(0)?;
                tracing::trace!(tag, "marked point");
            }

            // Compatibility
            Keyword::BX => self.do_BX(),
            Keyword::EX => return self.do_EX(),

            Keyword::Unknown(_) => {
                if self.compat_depth > 0 {
                    tracing::trace!(op = %op.as_str(), "unknown operator in compatibility section");
                } else {
                    tracing::warn!(op = %op.as_str(), "unknown operator");
                }
            }
        }
        Ok(())
    }

    // ========================================================================
    // State helpers
    // ========================================================================

    /// Send the ctm to the device if it changed since the last call.
    pub(crate) fn sync_transform(&mut self) {
        if self.device_ctm != Some(self.gstate.ctm) {
            self.device_ctm = Some(self.gstate.ctm);
            self.device.set_transform(self.gstate.ctm);
        }
    }

    /// Push a copy of the current state (`q`).
    pub(crate) fn save_state(&mut self) {
        self.gstack.push(self.gstate.clone());
    }

    /// Replace the current state with `state`, reporting clip changes.
    pub(crate) fn set_state(&mut self, state: GraphicsState) {
        let clip_changed = !self.gstate.same_clip(&state);
        self.gstate = state;
        if clip_changed {
            self.device.clip_changed(self.gstate.clip.as_deref());
        }
    }

    /// Pop saved states until `depth` remain, ending in the oldest popped.
    pub(crate) fn restore_to(&mut self, depth: usize) {
        if self.gstack.len() <= depth {
            return;
        }
        self.gstack.truncate(depth + 1);
        if let Some(state) = self.gstack.pop() {
            self.set_state(state);
        }
    }

    /// Intersect the clip with a device-space path and report the change.
    pub(crate) fn intersect_clip(&mut self, path: Path, rule: FillRule) {
        let clip = ClipPath::intersect(self.gstate.clip.as_deref(), path, rule);
        self.gstate.clip = Some(Arc::new(clip));
        self.device.clip_changed(self.gstate.clip.as_deref());
    }

    /// Look up a resource entry in the active scopes.
    pub(crate) fn require_resource(
        &self,
        category: &'static str,
        name: &str,
    ) -> Result<PDFObject> {
        self.scopes.require(self.resolver, category, name)
    }

    // ========================================================================
    // Marked content and compatibility sections
    // ========================================================================

    /// Begins a marked-content sequence.
    ///
    /// PDF operator: `BMC`
    pub fn do_BMC(&mut self, tag: &str) {
        self.marked_depth += 1;
        self.device.begin_marked(tag, None);
    }

    /// Begins a marked-content sequence with a property list, given inline
    /// or as a `/Properties` resource name.
    ///
    /// PDF operator: `BDC`
    pub fn do_BDC(&mut self, tag: &str, props: Option<&PDFObject>) -> Result<()> {
        let props = match props {
            Some(PDFObject::Dict(d)) => Some(d.clone()),
            Some(PDFObject::Name(name)) => {
                match self.require_resource(category::PROPERTIES, name) {
                    Ok(entry) => Some(self.resolver.resolve_dict(&entry)?),
                    Err(err) => {
                        tracing::warn!(error = %err, "marked-content properties");
                        None
                    }
                }
            }
            _ => None,
        };
        self.marked_depth += 1;
        self.device.begin_marked(tag, props.as_ref());
        Ok(())
    }

    /// Ends a marked-content sequence.
    ///
    /// PDF operator: `EMC`
    pub fn do_EMC(&mut self) {
        if self.marked_depth == 0 {
            tracing::warn!("EMC without matching BMC/BDC");
            return;
        }
        self.marked_depth -= 1;
        self.device.end_marked();
    }

    /// PDF operator: `BX`
    pub fn do_BX(&mut self) {
        self.compat_depth += 1;
    }

    /// PDF operator: `EX`
    pub fn do_EX(&mut self) -> Result<()> {
        if self.compat_depth == 0 {
            return Err(RenderError::malformed("EX", "EX without matching BX"));
        }
        self.compat_depth -= 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interp::device::{RecordingSurface, SurfaceCall};
    use crate::interp::resources::ObjectStore;

    fn run(content: &[u8], options: &RenderOptions) -> (Result<()>, Vec<SurfaceCall>) {
        let store = ObjectStore::new();
        let mut rm = ResourceManager::new();
        let mut surface = RecordingSurface::new();
        let result = {
            let mut interp = PageInterpreter::new(&store, &mut rm, &mut surface, options);
            interp.render_page(content, PDFDict::new(), MATRIX_IDENTITY)
        };
        (result, surface.into_calls())
    }

    #[test]
    fn test_arity_mismatch_is_fatal_when_strict() {
        let (result, _) = run(b"0 0 10 re f", &RenderOptions::default());
        assert!(matches!(
            result,
            Err(RenderError::MalformedOperatorSequence { ref op, .. }) if op == "re"
        ));
    }

    #[test]
    fn test_arity_mismatch_is_skipped_when_lenient() {
        let options = RenderOptions::default().with_strict_operands(false);
        let (result, calls) = run(b"0 0 10 re 0 0 5 5 re f", &options);
        assert!(result.is_ok());
        assert_eq!(
            calls
                .iter()
                .filter(|c| matches!(c, SurfaceCall::FillPath { .. }))
                .count(),
            1
        );
    }

    #[test]
    fn test_compatibility_sections() {
        let (result, _) = run(b"BX foo 1 2 bar EX 0 0 m", &RenderOptions::default());
        assert!(result.is_ok());
        let (result, _) = run(b"EX", &RenderOptions::default());
        assert!(matches!(
            result,
            Err(RenderError::MalformedOperatorSequence { .. })
        ));
    }

    #[test]
    fn test_unknown_operator_outside_bx_is_skipped() {
        let (result, calls) = run(b"frob 0 0 1 1 re f", &RenderOptions::default());
        assert!(result.is_ok());
        assert!(calls.iter().any(|c| matches!(c, SurfaceCall::FillPath { .. })));
    }

    #[test]
    fn test_marked_content_is_forwarded_and_closed() {
        let (result, calls) = run(
            b"/Span BMC /P <</MCID 0>> BDC EMC",
            &RenderOptions::default(),
        );
        assert!(result.is_ok());
        assert_eq!(
            calls,
            vec![
                SurfaceCall::BeginMarked { tag: "Span".into() },
                SurfaceCall::BeginMarked { tag: "P".into() },
                SurfaceCall::EndMarked,
                SurfaceCall::EndMarked,
            ]
        );
    }

    #[test]
    fn test_unbalanced_q_is_dropped() {
        let store = ObjectStore::new();
        let mut rm = ResourceManager::new();
        let mut surface = RecordingSurface::new();
        let options = RenderOptions::default();
        let mut interp = PageInterpreter::new(&store, &mut rm, &mut surface, &options);
        interp
            .render_page(b"q q 2 0 0 2 0 0 cm Q", PDFDict::new(), MATRIX_IDENTITY)
            .unwrap();
        assert_eq!(interp.stack_depth(), 0);
        assert_eq!(interp.ctm(), MATRIX_IDENTITY);
    }

    #[test]
    fn test_page_ctm_rotation() {
        let mediabox = (0.0, 0.0, 612.0, 792.0);
        assert_eq!(page_ctm(mediabox, 0), MATRIX_IDENTITY);
        assert_eq!(page_ctm(mediabox, 180), (-1.0, 0.0, 0.0, -1.0, 612.0, 792.0));
        assert_eq!(page_ctm(mediabox, -270), page_ctm(mediabox, 90));
    }
}
