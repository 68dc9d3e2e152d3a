//! Butcher tableaux for the explicit Runge-Kutta schemes.
//!
//! Every scheme is stored as a square `S × S` tableau so that the solvers in
//! [`crate::solver`] can be generic over the stage count. Schemes without an
//! embedded error estimate carry [`ErrorEstimate::None`].
//!
//! - [`DOP853`]: Dormand & Prince 8(5,3) (Hairer, Nørsett & Wanner, Sect.
//!   II.10). Used as the high-order fixed-step scheme and, adaptively, by the
//!   native substrate.
//! - [`DOPRI54`]: Dormand & Prince (1980) 5(4), the general-purpose
//!   adaptive scheme.
//! - [`RK4`]: classical fourth-order Runge-Kutta.
//! - [`RK6`]: Butcher's seven-stage sixth-order method.

/// How a scheme estimates its local error.
#[derive(Debug, Clone, Copy)]
pub enum ErrorEstimate<const S: usize> {
    /// Fixed-step only
    None,
    /// Error weights b_i − b̂_i of one embedded solution
    Embedded([f64; S]),
    /// Fifth- and third-order differences combined as
    /// `err₅² / √(err₅² + 0.01 err₃²)`, which stays sensitive when the
    /// fifth-order difference alone vanishes
    Blended {
        /// b_i − b̂_i against the fifth-order solution
        fifth: [f64; S],
        /// b_i − b̂_i against the third-order solution
        third: [f64; S],
    },
}

/// Explicit Runge-Kutta scheme with `S` stages.
#[derive(Debug, Clone, Copy)]
pub struct Tableau<const S: usize> {
    /// Scheme name for diagnostics
    pub name: &'static str,
    /// Order of the propagated solution
    pub order: u8,
    /// Order of the embedded solution (0 when there is none)
    pub embedded_order: u8,
    /// Nodes c_i
    pub c: [f64; S],
    /// Strictly lower-triangular Runge-Kutta matrix a_ij
    pub a: [[f64; S]; S],
    /// Weights of the propagated solution
    pub b: [f64; S],
    /// Local error estimate
    pub error: ErrorEstimate<S>,
}

impl<const S: usize> Tableau<S> {
    /// True when the scheme carries an embedded error estimate.
    pub fn is_embedded(&self) -> bool {
        !matches!(self.error, ErrorEstimate::None)
    }

    /// Exponent of the I-controller, 1 / (q + 1) with q the lower order.
    pub fn controller_exponent(&self) -> f64 {
        let q = self.order.min(self.embedded_order).max(1);
        1.0 / (q as f64 + 1.0)
    }
}

/// Dormand-Prince 8(5,3), 12 stages.
///
/// The error estimate blends the differences to a fifth- and a third-order
/// solution; the step controller treats the pair as order 8(7).
#[allow(clippy::excessive_precision)]
pub const DOP853: Tableau<12> = Tableau {
    name: "DOP8(5,3)",
    order: 8,
    embedded_order: 7,
    c: [
        0.0,
        0.526001519587677318785587544488e-01,
        0.789002279381515978178381316732e-01,
        0.118350341907227396726757197510,
        0.281649658092772603273242802490,
        1.0 / 3.0,
        0.25,
        4.0 / 13.0,
        0.651282051282051282051282051282,
        0.6,
        6.0 / 7.0,
        1.0,
    ],
    a: [
        [0.0; 12],
        [
            5.26001519587677318785587544488e-2,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        [
            1.97250569845378994544595329183e-2,
            5.91751709536136983633785987549e-2,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        [
            2.95875854768068491816892993775e-2,
            0.0,
            8.87627564304205475450678981324e-2,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        [
            2.41365134159266685502369798665e-1,
            0.0,
            -8.84549479328286085344864962717e-1,
            9.24834003261792003115737966543e-1,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        [
            3.7037037037037037037037037037e-2,
            0.0,
            0.0,
            1.70828608729473871279604482173e-1,
            1.25467687566822425016691814123e-1,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        [
            3.7109375e-2,
            0.0,
            0.0,
            1.70252211019544039314978060272e-1,
            6.02165389804559606850219397283e-2,
            -1.7578125e-2,
            0.0, 0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        [
            3.70920001185047927108779319836e-2,
            0.0,
            0.0,
            1.70383925712239993810214054705e-1,
            1.07262030446373284651809199168e-1,
            -1.53194377486244017527936158236e-2,
            8.27378916381402288758473766002e-3,
            0.0, 0.0, 0.0, 0.0, 0.0,
        ],
        [
            6.24110958716075717114429577812e-1,
            0.0,
            0.0,
            -3.36089262944694129406857109825,
            -8.68219346841726006818189891453e-1,
            2.75920996994467083049415600797e1,
            2.01540675504778934086186788979e1,
            -4.34898841810699588477366255144e1,
            0.0, 0.0, 0.0, 0.0,
        ],
        [
            4.77662536438264365890433908527e-1,
            0.0,
            0.0,
            -2.48811461997166764192642586468,
            -5.90290826836842996371446475743e-1,
            2.12300514481811942347288949897e1,
            1.52792336328824235832596922938e1,
            -3.32882109689848629194453265587e1,
            -2.03312017085086261358222928593e-2,
            0.0, 0.0, 0.0,
        ],
        [
            -9.3714243008598732571704021658e-1,
            0.0,
            0.0,
            5.18637242884406370830023853209,
            1.09143734899672957818500254654,
            -8.14978701074692612513997267357,
            -1.85200656599969598641566180701e1,
            2.27394870993505042818970056734e1,
            2.49360555267965238987089396762,
            -3.0467644718982195003823669022,
            0.0, 0.0,
        ],
        [
            2.27331014751653820792359768449,
            0.0,
            0.0,
            -1.05344954667372501984066689879e1,
            -2.00087205822486249909675718444,
            -1.79589318631187989172765950534e1,
            2.79488845294199600508499808837e1,
            -2.85899827713502369474065508674,
            -8.87285693353062954433549289258,
            1.23605671757943030647266201528e1,
            6.43392746015763530355970484046e-1,
            0.0,
        ],
    ],
    b: [
        5.42937341165687622380535766363e-2,
        0.0,
        0.0,
        0.0,
        0.0,
        4.45031289275240888144113950566,
        1.89151789931450038304281599044,
        -5.8012039600105847814672114227,
        3.1116436695781989440891606237e-1,
        -1.52160949662516078556178806805e-1,
        2.01365400804030348374776537501e-1,
        4.47106157277725905176885569043e-2,
    ],
    error: ErrorEstimate::Blended {
        fifth: [
            0.1312004499419488073250102996e-1,
            0.0,
            0.0,
            0.0,
            0.0,
            -0.1225156446376204440720569753e+1,
            -0.4957589496572501915214079952,
            0.1664377182454986536961530415e+1,
            -0.3503288487499736816886487290,
            0.3341791187130174790297318841,
            0.8192320648511571246570742613e-1,
            -0.2235530786388629525884427845e-1,
        ],
        // b minus b̂₃ = [0.244094488188976377952755905512, 0 ×7,
        // 0.733846688281611857341361741547, 0, 0, 3/136]
        third: [
            -0.1898007540724076157147023288757,
            0.0,
            0.0,
            0.0,
            0.0,
            4.45031289275240888144113950566,
            1.89151789931450038304281599044,
            -5.8012039600105847814672114227,
            -0.422682321323791962932445679177,
            -1.52160949662516078556178806805e-1,
            2.01365400804030348374776537501e-1,
            0.0226517921983608258118062039631,
        ],
    },
};

/// Dormand-Prince 5(4), 7 stages, first-same-as-last.
pub const DOPRI54: Tableau<7> = Tableau {
    name: "DOPRI5(4)",
    order: 5,
    embedded_order: 4,
    c: [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0],
    a: [
        [0.0; 7],
        [1.0/5.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [3.0/40.0, 9.0/40.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [44.0/45.0, -56.0/15.0, 32.0/9.0, 0.0, 0.0, 0.0, 0.0],
        [19372.0/6561.0, -25360.0/2187.0, 64448.0/6561.0, -212.0/729.0, 0.0, 0.0, 0.0],
        [9017.0/3168.0, -355.0/33.0, 46732.0/5247.0, 49.0/176.0, -5103.0/18656.0, 0.0, 0.0],
        [35.0/384.0, 0.0, 500.0/1113.0, 125.0/192.0, -2187.0/6784.0, 11.0/84.0, 0.0],
    ],
    b: [
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
        0.0,
    ],
    // b5 − b4 with b4 = [5179/57600, 0, 7571/16695, 393/640, −92097/339200, 187/2100, 1/40]
    error: ErrorEstimate::Embedded([
        71.0 / 57600.0,
        0.0,
        -71.0 / 16695.0,
        71.0 / 1920.0,
        -17253.0 / 339200.0,
        22.0 / 525.0,
        -1.0 / 40.0,
    ]),
};

/// Classical fourth-order Runge-Kutta.
pub const RK4: Tableau<4> = Tableau {
    name: "RK4",
    order: 4,
    embedded_order: 0,
    c: [0.0, 0.5, 0.5, 1.0],
    a: [
        [0.0; 4],
        [0.5, 0.0, 0.0, 0.0],
        [0.0, 0.5, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
    ],
    b: [1.0 / 6.0, 1.0 / 3.0, 1.0 / 3.0, 1.0 / 6.0],
    error: ErrorEstimate::None,
};

/// Butcher (1964) sixth-order method, 7 stages.
pub const RK6: Tableau<7> = Tableau {
    name: "RK6",
    order: 6,
    embedded_order: 0,
    c: [0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0 / 3.0, 0.5, 0.5, 1.0],
    a: [
        [0.0; 7],
        [1.0/3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [0.0, 2.0/3.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [1.0/12.0, 1.0/3.0, -1.0/12.0, 0.0, 0.0, 0.0, 0.0],
        [-1.0/16.0, 9.0/8.0, -3.0/16.0, -3.0/8.0, 0.0, 0.0, 0.0],
        [0.0, 9.0/8.0, -3.0/8.0, -3.0/4.0, 1.0/2.0, 0.0, 0.0],
        [9.0/44.0, -9.0/11.0, 63.0/44.0, 18.0/11.0, 0.0, -16.0/11.0, 0.0],
    ],
    b: [
        11.0 / 120.0,
        0.0,
        27.0 / 40.0,
        27.0 / 40.0,
        -4.0 / 15.0,
        -4.0 / 15.0,
        11.0 / 120.0,
    ],
    error: ErrorEstimate::None,
};
