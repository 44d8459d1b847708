use futures::executor::block_on;
use lumen_core::{
    BlockShell, BlockState, CapabilityName, GenerationBlock, LumenConfig, RenderOutcome, Runtime,
    VNode,
};
use lumen_render::canvas::{Overflow, ScrollNode, ScrollTree, WheelEvent, WheelOutcome};
use lumen_render::{DiagramCanvas, PanelOptions, default_surface, outcome_html, render_html};
use std::sync::Arc;

fn runtime(config: &LumenConfig) -> Runtime {
    let surface = default_surface(config).expect("default surface");
    Runtime::with_config(Arc::new(surface), config)
}

fn render_with(config: &LumenConfig, text: &str) -> RenderOutcome {
    let mut shell = BlockShell::new(runtime(config), GenerationBlock::new(text));
    block_on(shell.run()).clone()
}

fn render(text: &str) -> VNode {
    match render_with(&LumenConfig::default(), text) {
        RenderOutcome::Rendered { tree } => tree,
        RenderOutcome::Failed { failure } => panic!("block failed: {}\n{}", failure.message, failure.trace),
    }
}

/// Every `<svg>...</svg>` in `html`, each parsed as a standalone XML document.
fn assert_svgs_well_formed(html: &str) -> usize {
    let mut count = 0;
    let mut rest = html;
    while let Some(start) = rest.find("<svg") {
        let end = rest[start..].find("</svg>").expect("closed svg") + start + "</svg>".len();
        let svg = &rest[start..end];
        roxmltree::Document::parse(svg).unwrap_or_else(|e| panic!("{e}\n{svg}"));
        count += 1;
        rest = &rest[end..];
    }
    count
}

#[test]
fn a_line_chart_renders_well_formed_svg() {
    let tree = render(
        r##"
        const { ResponsiveContainer, LineChart, Line, XAxis, YAxis, CartesianGrid, Tooltip, Legend } = Recharts;
        const data = [
          { month: 'Jan', uv: 400, pv: 240 },
          { month: 'Feb', uv: 300, pv: 139 },
          { month: 'Mar', uv: 520, pv: 380 },
        ];
        return (
          <ResponsiveContainer width="100%" height={320}>
            <LineChart data={data}>
              <CartesianGrid strokeDasharray="3 3" />
              <XAxis dataKey="month" />
              <YAxis tickFormatter={(v) => `$${v}`} />
              <Tooltip />
              <Legend />
              <Line type="monotone" dataKey="uv" stroke="#8884d8" name="Visitors" />
              <Line dataKey="pv" stroke="#82ca9d" />
            </LineChart>
          </ResponsiveContainer>
        );
        "##,
    );
    let html = render_html(&tree);
    assert!(html.starts_with(r#"<div class="recharts-responsive-container""#), "{html}");
    assert!(html.contains("recharts-wrapper"));
    assert_eq!(assert_svgs_well_formed(&html), 1);
    assert!(html.contains(r##"stroke="#8884d8""##));
    assert!(html.contains(">Visitors<"));
    assert!(html.contains(">Feb<"));
    assert!(html.contains(">$0<"), "{html}");
    assert!(!html.contains("lumen-part"));
}

#[test]
fn a_bar_chart_draws_one_rectangle_per_row() {
    let tree = render(
        r#"
        const rows = [1, 2, 3, 4].map((n) => ({ name: `Q${n}`, sales: n * 10 }));
        return (
          <Recharts.BarChart data={rows} width={400} height={200}>
            <Recharts.XAxis dataKey="name" />
            <Recharts.Bar dataKey="sales" />
          </Recharts.BarChart>
        );
        "#,
    );
    let bars = tree.find(&|el| el.has_class("recharts-bar")).expect("bar series");
    let rects = bars
        .children
        .iter()
        .filter(|c| c.as_element().is_some_and(|e| e.has_class("recharts-rectangle")))
        .count();
    assert_eq!(rects, 4);
    assert_eq!(assert_svgs_well_formed(&render_html(&tree)), 1);
}

#[test]
fn plot_is_loaded_on_first_use_and_samples_generated_functions() {
    let tree = render(
        r#"
        return (
          <div>
            <Plot
              data={[{ x: [1, 2, 3], y: [2, 4, 8], type: 'scatter', name: 'growth' }]}
              layout={{ title: 'Growth', xaxis: { title: 'day' } }}
            />
            <Plot fn={(x) => Math.sin(x)} domain={[0, Math.PI * 2]} samples={50} />
          </div>
        );
        "#,
    );
    let html = render_html(&tree);
    assert_eq!(assert_svgs_well_formed(&html), 2);
    assert!(html.contains(">Growth<"));
    assert!(html.contains(">day<"));
}

#[test]
fn apostrophes_in_jsx_text_do_not_hide_lazy_capabilities() {
    let tree = render(
        "return (<div><p>Don't panic</p><Plot data={[{ x: [1, 2], y: [1, 2] }]} /><p>It's fine</p></div>);",
    );
    let html = render_html(&tree);
    assert_eq!(assert_svgs_well_formed(&html), 1);
    assert!(html.contains("Don't panic"));
    assert!(html.contains("It's fine"));
}

#[test]
fn plot_argument_errors_fail_the_block() {
    let outcome = render_with(
        &LumenConfig::default(),
        "return <Plot fn={(x) => x} domain={[1, 1]} />;",
    );
    let failure = outcome.failure().expect("bad domain");
    assert!(failure.message.starts_with("RangeError: Plot domain"), "{}", failure.message);
    let html = outcome_html(&outcome, PanelOptions::default());
    assert!(html.contains(r#"data-action="retry""#));
}

#[test]
fn latex_and_code_render_inline() {
    let tree = render(
        r#"
        const code = "def area(r):\n    return 3.14 * r ** 2  # circle";
        return (
          <article>
            <p>The area is <Latex>{"\\pi r^2"}</Latex>.</p>
            <SyntaxHighlighter language="python" style={dark} showLineNumbers>{code}</SyntaxHighlighter>
          </article>
        );
        "#,
    );
    let html = render_html(&tree);
    assert!(html.contains(r#"data-tex="\pi r^2""#), "{html}");
    assert!(html.contains("π") && html.contains("r²"), "{html}");
    assert!(html.contains(r#"<pre class="lumen-code language-python""#));
    assert!(html.contains(r#"class="token keyword""#));
    assert!(html.contains(">def</span>"));
    assert!(html.contains(r#"class="token comment""#));
    assert!(html.contains("lumen-line-number"));
}

#[test]
fn flow_canvases_hand_the_wheel_to_the_page() {
    let tree = render(
        r#"
        const nodes = [
          { id: 'a', position: { x: 0, y: 0 }, data: { label: 'Normalize' } },
          { id: 'b', position: { x: 0, y: 120 }, data: { label: 'Compile' } },
        ];
        const edges = [{ id: 'e1', source: 'a', target: 'b', animated: true }];
        return (
          <RF.ReactFlow nodes={nodes} edges={edges} fitView zoomOnScroll>
            <RF.Background />
            <RF.Controls />
          </RF.ReactFlow>
        );
        "#,
    );
    let flow = tree.find(&|el| el.has_class("react-flow")).expect("flow root");
    assert_eq!(flow.attr_str("data-wheel"), Some("scroll-parent"));
    assert_eq!(flow.attr_str("data-zoom-on-scroll"), Some("false"));
    assert!(tree.text_content().contains("Normalize"));
    assert!(assert_svgs_well_formed(&render_html(&tree)) >= 1);

    let mut page = ScrollTree::new(900.0, 4000.0);
    let article = page.add_child(
        page.root(),
        ScrollNode::scrolling(Overflow::Auto, 700.0, 2400.0),
    );
    let container = page.add_child(article, ScrollNode::plain(400.0));
    let mut canvas = DiagramCanvas::from_element(flow, container, None);
    let before = canvas.viewport();

    let outcome = canvas.dispatch_wheel(WheelEvent::new(container, 180.0), &mut page);
    assert_eq!(
        outcome,
        WheelOutcome::Scrolled {
            node: article,
            distance: 180.0
        }
    );
    assert_eq!(page.scroll_top(article), 180.0);
    assert_eq!(page.scroll_top(page.root()), 0.0);
    assert_eq!(canvas.viewport(), before);
}

#[test]
fn the_scroll_adapter_can_be_switched_off() {
    let config = LumenConfig::with_overrides(&serde_json::json!({
        "canvas": { "scrollAdapter": false }
    }));
    let outcome = render_with(
        &config,
        "return <RF.ReactFlow nodes={[]} edges={[]} />;",
    );
    let tree = outcome.tree().expect("rendered");
    let flow = tree.find(&|el| el.has_class("react-flow")).expect("flow root");
    assert_eq!(flow.attr_str("data-wheel"), None);
    assert_eq!(flow.attr_str("data-zoom-on-scroll"), Some("true"));
}

#[test]
fn motion_elements_render_their_resting_state() {
    let tree = render(
        r#"
        return (
          <motion.AnimatePresence>
            <motion.div initial={{ opacity: 0, x: -40 }} animate={{ opacity: 1, x: 0 }}>
              hello
            </motion.div>
          </motion.AnimatePresence>
        );
        "#,
    );
    let html = render_html(&tree);
    assert!(
        html.starts_with(r#"<div style="opacity:1;transform:translateX(0px)" data-motion="#),
        "{html}"
    );
    assert!(html.contains("hello"));
}

#[test]
fn a_failing_block_leaves_its_siblings_rendered() {
    let runtime = runtime(&LumenConfig::default());
    let mut page = lumen_core::Page::new(
        &runtime,
        [
            GenerationBlock::new("return <Latex math=\"x^2\" />;"),
            GenerationBlock::new("const [n] = useState(0); return <p>{n}</p>;"),
            GenerationBlock::new("return <Recharts.PieChart><Recharts.Pie data={[{ name: 'a', value: 1 }]} dataKey=\"value\" /></Recharts.PieChart>;"),
        ],
    );
    let outcomes = block_on(page.run_all());
    assert!(outcomes[0].is_rendered());
    assert_eq!(
        outcomes[1].failure().map(|f| f.message.as_str()),
        Some("ReferenceError: useState is not defined")
    );
    assert!(outcomes[2].is_rendered());
    assert_eq!(page.shells()[1].state(), BlockState::Failed);
    assert!(runtime.surface().is_ready(&[CapabilityName::Latex]));
}
